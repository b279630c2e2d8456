//! # Departments
//!
//! Departments attribute transactions to a part of the business. Deleting a
//! department keeps its transactions with `department_id` cleared.

use tracing::info;

use larder_core::validation::{validate_department_patch, validate_new_department};
use larder_core::{Actor, CoreError, Department, DepartmentPatch, NewDepartment, Role};
use larder_db::{generate_id, DepartmentRepository, SqliteConnection};

use crate::error::LedgerResult;
use crate::ledger::{commit, duplicate_name, Ledger};

const NAME_COLUMN: &str = "departments.name";

/// Fails with `NotFound` unless the department exists on `conn`.
pub(crate) async fn require_department(
    conn: &mut SqliteConnection,
    department_id: &str,
) -> LedgerResult<Department> {
    DepartmentRepository::fetch(conn, department_id)
        .await?
        .ok_or_else(|| CoreError::not_found("Department", department_id).into())
}

impl Ledger {
    pub async fn create_department(
        &self,
        input: &NewDepartment,
        actor: &Actor,
    ) -> LedgerResult<Department> {
        actor.require(Role::Supervisor)?;
        validate_new_department(input)?;

        let now = self.clock.now();
        let department = Department {
            id: generate_id(),
            name: input.name.trim().to_string(),
            description: input.description.clone(),
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.db.begin().await?;
        DepartmentRepository::insert(&mut tx, &department)
            .await
            .map_err(|e| duplicate_name(e, NAME_COLUMN, "Department", &department.name))?;
        commit(tx).await?;

        info!(department_id = %department.id, name = %department.name, "Department created");
        Ok(department)
    }

    pub async fn get_department(&self, id: &str) -> LedgerResult<Department> {
        self.db
            .departments()
            .get_by_id(id)
            .await?
            .ok_or_else(|| CoreError::not_found("Department", id).into())
    }

    pub async fn list_departments(&self) -> LedgerResult<Vec<Department>> {
        Ok(self.db.departments().list().await?)
    }

    /// Renames or re-describes a department.
    pub async fn update_department(
        &self,
        id: &str,
        patch: &DepartmentPatch,
        actor: &Actor,
    ) -> LedgerResult<Department> {
        actor.require(Role::Supervisor)?;
        validate_department_patch(patch)?;

        let mut tx = self.db.begin().await?;
        let mut department = require_department(&mut tx, id).await?;

        if let Some(name) = &patch.name {
            department.name = name.trim().to_string();
        }
        if let Some(description) = &patch.description {
            department.description = Some(description.clone());
        }
        department.updated_at = self.clock.now();

        DepartmentRepository::update(&mut tx, &department)
            .await
            .map_err(|e| duplicate_name(e, NAME_COLUMN, "Department", &department.name))?;
        commit(tx).await?;

        info!(department_id = %department.id, "Department updated");
        Ok(department)
    }

    pub async fn delete_department(&self, id: &str, actor: &Actor) -> LedgerResult<()> {
        actor.require(Role::Supervisor)?;

        let mut tx = self.db.begin().await?;
        DepartmentRepository::delete(&mut tx, id).await?;
        commit(tx).await?;

        info!(department_id = %id, "Department deleted");
        Ok(())
    }
}
