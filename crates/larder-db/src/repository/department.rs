//! # Department Repository
//!
//! Departments only attribute transactions. Deleting one clears
//! `department_id` on its transactions (`ON DELETE SET NULL`).

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use larder_core::Department;

/// Repository for department database operations.
#[derive(Debug, Clone)]
pub struct DepartmentRepository {
    pool: SqlitePool,
}

impl DepartmentRepository {
    /// Creates a new DepartmentRepository.
    pub fn new(pool: SqlitePool) -> Self {
        DepartmentRepository { pool }
    }

    /// Gets a department by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Department>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch(&mut conn, id).await
    }

    /// Gets a department by ID on the given connection.
    pub async fn fetch(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Department>> {
        let department = sqlx::query_as::<_, Department>(
            r#"
            SELECT id, name, description, created_at, updated_at
            FROM departments
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(department)
    }

    /// Lists all departments by name.
    pub async fn list(&self) -> DbResult<Vec<Department>> {
        let departments = sqlx::query_as::<_, Department>(
            r#"
            SELECT id, name, description, created_at, updated_at
            FROM departments
            ORDER BY name ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(departments)
    }

    /// Inserts a department.
    ///
    /// ## Errors
    /// * `UniqueViolation` on `departments.name` if the name is taken
    pub async fn insert(conn: &mut SqliteConnection, department: &Department) -> DbResult<()> {
        debug!(id = %department.id, name = %department.name, "Inserting department");

        sqlx::query(
            r#"
            INSERT INTO departments (id, name, description, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&department.id)
        .bind(&department.name)
        .bind(&department.description)
        .bind(department.created_at)
        .bind(department.updated_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Updates name and description.
    pub async fn update(conn: &mut SqliteConnection, department: &Department) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE departments SET name = ?2, description = ?3, updated_at = ?4
            WHERE id = ?1
            "#,
        )
        .bind(&department.id)
        .bind(&department.name)
        .bind(&department.description)
        .bind(department.updated_at)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Department", &department.id));
        }

        Ok(())
    }

    /// Deletes a department.
    pub async fn delete(conn: &mut SqliteConnection, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM departments WHERE id = ?1")
            .bind(id)
            .execute(&mut *conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Department", id));
        }

        Ok(())
    }
}
