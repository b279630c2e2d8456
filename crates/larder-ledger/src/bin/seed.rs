//! # Seed Data Generator
//!
//! Populates a ledger database with a small kitchen for development.
//!
//! ## Usage
//! ```bash
//! # Seed ./larder_dev.db
//! cargo run -p larder-ledger --bin seed
//!
//! # Specify database path
//! cargo run -p larder-ledger --bin seed -- --db ./data/larder.db
//!
//! # Start from a config file (database path from --db still wins)
//! cargo run -p larder-ledger --bin seed -- --config ./larder.toml
//! ```
//!
//! ## Generated Data
//! - Departments: Kitchen, Bar, Pastry
//! - Raw materials with thresholds and prices
//! - Equipment with unit counts
//! - A week of issues, returns and restocks attributed to departments

use chrono::Duration;
use std::env;
use std::path::PathBuf;

use larder_core::{
    Actor, InventoryFilter, NewDepartment, NewEquipment, NewRawMaterial, QuantityUnit, Report,
    Role, TransactionIntent, TransactionType,
};
use larder_ledger::{Ledger, LedgerConfig};

/// (name, unit, opening quantity, critical threshold, price per unit)
const RAW_MATERIALS: &[(&str, QuantityUnit, f64, f64, f64)] = &[
    ("Flour", QuantityUnit::Kg, 120.0, 25.0, 0.9),
    ("Sugar", QuantityUnit::Kg, 60.0, 10.0, 1.1),
    ("Butter", QuantityUnit::Kg, 25.0, 5.0, 8.4),
    ("Whole Milk", QuantityUnit::Liter, 80.0, 20.0, 1.3),
    ("Eggs", QuantityUnit::Piece, 360.0, 60.0, 0.25),
    ("Olive Oil", QuantityUnit::Liter, 20.0, 4.0, 9.5),
    ("Lemons", QuantityUnit::Piece, 90.0, 15.0, 0.4),
    ("Tonic Water", QuantityUnit::Liter, 48.0, 12.0, 2.2),
];

/// (name, total units, price per unit)
const EQUIPMENT: &[(&str, i64, f64)] = &[
    ("Stand Mixer", 4, 420.0),
    ("Sheet Pan", 40, 12.0),
    ("Chef Knife", 12, 85.0),
    ("Cocktail Shaker", 10, 18.0),
];

const DEPARTMENTS: &[&str] = &["Kitchen", "Bar", "Pastry"];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    larder_ledger::init_tracing();

    let args: Vec<String> = env::args().collect();

    let mut db_path: Option<String> = None;
    let mut config_path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Larder Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>        Database file path (default: ./larder_dev.db)");
                println!("  -c, --config <PATH>    larder.toml to start from");
                println!("  -h, --help             Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let mut config = match config_path {
        Some(path) => LedgerConfig::load(Some(path))?,
        None => LedgerConfig::default(),
    };
    config.database.path = PathBuf::from(db_path.unwrap_or_else(|| "./larder_dev.db".into()));

    println!("Larder Seed Data Generator");
    println!("==========================");
    println!("Database: {}", config.database.path.display());
    println!("Policy:   {}", config.ledger.status_policy);
    println!();

    let ledger = Ledger::open(&config).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = ledger.database().inventories().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} inventory items", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let admin = Actor::new("seed-admin", Role::Admin);
    let start = std::time::Instant::now();

    let mut departments = Vec::new();
    for name in DEPARTMENTS {
        let department = ledger
            .create_department(
                &NewDepartment {
                    name: name.to_string(),
                    description: None,
                },
                &admin,
            )
            .await?;
        departments.push(department);
    }
    println!("✓ Created {} departments", departments.len());

    let mut raw_ids = Vec::new();
    for (name, unit, quantity, threshold, price) in RAW_MATERIALS {
        let item = ledger
            .create_raw_material(
                &NewRawMaterial {
                    name: name.to_string(),
                    price_per_unit: Some(*price),
                    quantity: *quantity,
                    quantity_unit: *unit,
                    critical_threshold: Some(*threshold),
                    is_perishable: matches!(unit, QuantityUnit::Liter | QuantityUnit::Piece),
                    ..Default::default()
                },
                &admin,
            )
            .await?;
        raw_ids.push(item.id);
    }

    let mut equipment_ids = Vec::new();
    for (name, total_units, price) in EQUIPMENT {
        let item = ledger
            .create_equipment(
                &NewEquipment {
                    name: name.to_string(),
                    price_per_unit: Some(*price),
                    total_units: *total_units,
                    ..Default::default()
                },
                &admin,
            )
            .await?;
        equipment_ids.push(item.id);
    }
    println!(
        "✓ Created {} raw materials and {} equipment items",
        raw_ids.len(),
        equipment_ids.len()
    );

    // A week of kitchen activity: each item issued on a rotating day, with
    // occasional returns and a restock when an item runs low.
    let mut recorded = 0;
    for (idx, id) in raw_ids.iter().enumerate() {
        let department = &departments[idx % departments.len()];
        for day in 0..7_i64 {
            let quantity = (RAW_MATERIALS[idx].2 * 0.08).round().max(1.0);
            let intent = TransactionIntent {
                inventory_id: id.clone(),
                transaction_type: TransactionType::Issue,
                quantity,
                department_id: Some(department.id.clone()),
                notes: Some(format!("Day {} prep", day + 1)),
            };
            match ledger.process_transaction(&intent, &admin).await {
                Ok(_) => recorded += 1,
                Err(e) => eprintln!("Failed to issue {}: {}", RAW_MATERIALS[idx].0, e),
            }
        }

        let status = ledger.calculate_current_status(id).await?;
        if status.is_low {
            let restock = TransactionIntent {
                inventory_id: id.clone(),
                transaction_type: TransactionType::Restock,
                quantity: RAW_MATERIALS[idx].2 / 2.0,
                department_id: None,
                notes: Some("Weekly delivery".to_string()),
            };
            ledger.process_transaction(&restock, &admin).await?;
            recorded += 1;
        }
    }

    for (idx, id) in equipment_ids.iter().enumerate() {
        let issued = (EQUIPMENT[idx].1 / 2).max(1) as f64;
        for transaction_type in [TransactionType::Issue, TransactionType::Return] {
            let quantity = match transaction_type {
                TransactionType::Return => (issued - 1.0).max(1.0),
                _ => issued,
            };
            let intent = TransactionIntent {
                inventory_id: id.clone(),
                transaction_type,
                quantity,
                department_id: Some(departments[0].id.clone()),
                notes: None,
            };
            ledger.process_transaction(&intent, &admin).await?;
            recorded += 1;
        }
    }

    let elapsed = start.elapsed();
    println!();
    println!("✓ Recorded {} transactions in {:?}", recorded, elapsed);

    // Verify reports
    println!();
    println!("Verifying reports...");
    let items = ledger.list_inventory(&InventoryFilter::default()).await?;
    println!("  Inventory items: {}", items.len());

    if let Report::LowStock(low) = ledger.generate_report_by_name("low_stock").await? {
        println!("  Low stock: {} item(s)", low.items.len());
    }
    if let Report::Value(value) = ledger.generate_report_by_name("value").await? {
        println!("  Inventory value: {:.2}", value.total_inventory_value);
    }
    if let Report::Usage(usage) = ledger.generate_report_by_name("usage").await? {
        if let Some(top) = usage.top_used_items.first() {
            println!("  Most used: {} ({})", top.name, top.issued_quantity);
        }
    }

    println!();
    println!(
        "Transactions stay revisable for {} day(s); the window closes {}.",
        ledger.revision_policy().window_days(),
        (chrono::Utc::now() + Duration::days(ledger.revision_policy().window_days())).date_naive()
    );
    ledger.database().close().await;
    println!("✓ Seed complete!");

    Ok(())
}
