//! Employee lookups and upserts.

use sea_query::{Expr, Query, SqliteQueryBuilder};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

use crate::model::Employee;

use super::helpers::get_uuid;
use super::schema::Employees;
use super::Result;

const EMPLOYEE_COLUMNS: [Employees; 6] = [
    Employees::EmployeeId,
    Employees::TaxIdentifier,
    Employees::FirstName,
    Employees::LastName,
    Employees::RoutingNumber,
    Employees::AccountNumber,
];

fn decode_employee(row: &SqliteRow) -> Result<Employee> {
    Ok(Employee {
        employee_id: get_uuid(row, "employee_id")?,
        tax_identifier: row.try_get("tax_identifier")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        routing_number: row.try_get("routing_number")?,
        account_number: row.try_get("account_number")?,
    })
}

pub async fn get_employee(
    conn: &mut SqliteConnection,
    employee_id: Uuid,
) -> Result<Option<Employee>> {
    let sql = Query::select()
        .columns(EMPLOYEE_COLUMNS)
        .from(Employees::Table)
        .and_where(Expr::col(Employees::EmployeeId).eq(employee_id.to_string()))
        .to_string(SqliteQueryBuilder);
    let row = sqlx::query(&sql).fetch_optional(&mut *conn).await?;
    row.as_ref().map(decode_employee).transpose()
}

pub async fn get_employee_by_tax_identifier(
    conn: &mut SqliteConnection,
    tax_identifier: &str,
) -> Result<Option<Employee>> {
    let sql = Query::select()
        .columns(EMPLOYEE_COLUMNS)
        .from(Employees::Table)
        .and_where(Expr::col(Employees::TaxIdentifier).eq(tax_identifier))
        .to_string(SqliteQueryBuilder);
    let row = sqlx::query(&sql).fetch_optional(&mut *conn).await?;
    row.as_ref().map(decode_employee).transpose()
}

/// Insert or update an employee keyed by tax identifier.
///
/// The tax identifier is the stable natural key from the extract; names
/// and EFT details are refreshed on every ingest so later corrections
/// flow through.
pub async fn upsert_employee(
    conn: &mut SqliteConnection,
    tax_identifier: &str,
    first_name: &str,
    last_name: &str,
    routing_number: Option<&str>,
    account_number: Option<&str>,
) -> Result<Employee> {
    if let Some(existing) = get_employee_by_tax_identifier(conn, tax_identifier).await? {
        let sql = Query::update()
            .table(Employees::Table)
            .value(Employees::FirstName, first_name)
            .value(Employees::LastName, last_name)
            .value(
                Employees::RoutingNumber,
                routing_number.map(str::to_string),
            )
            .value(
                Employees::AccountNumber,
                account_number.map(str::to_string),
            )
            .and_where(Expr::col(Employees::EmployeeId).eq(existing.employee_id.to_string()))
            .to_string(SqliteQueryBuilder);
        sqlx::query(&sql).execute(&mut *conn).await?;
        return Ok(Employee {
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            routing_number: routing_number.map(str::to_string),
            account_number: account_number.map(str::to_string),
            ..existing
        });
    }

    let employee = Employee {
        employee_id: Uuid::new_v4(),
        tax_identifier: tax_identifier.to_string(),
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        routing_number: routing_number.map(str::to_string),
        account_number: account_number.map(str::to_string),
    };
    let sql = Query::insert()
        .into_table(Employees::Table)
        .columns(EMPLOYEE_COLUMNS)
        .values_panic([
            employee.employee_id.to_string().into(),
            tax_identifier.into(),
            first_name.into(),
            last_name.into(),
            routing_number.map(str::to_string).into(),
            account_number.map(str::to_string).into(),
        ])
        .to_string(SqliteQueryBuilder);
    sqlx::query(&sql).execute(&mut *conn).await?;
    Ok(employee)
}
