//! Prints the columns of the CRM tables and the values of its enum types.

use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use std::env;

const CRM_TABLES: &[&str] = &["leads", "interactions", "follow_ups", "samples"];
const CRM_ENUMS: &[&str] = &["lead_status", "lead_priority", "sample_status"];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let database_url = env::var("DB_URL")
        .or_else(|_| env::var("DATABASE_URL"))
        .map_err(|_| anyhow::anyhow!("DB_URL or DATABASE_URL must be set"))?;
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&database_url)
        .await?;

    for table in CRM_TABLES {
        let columns: Vec<(String, String, String)> = sqlx::query_as(
            "SELECT column_name, data_type, is_nullable FROM information_schema.columns \
             WHERE table_schema = current_schema() AND table_name = $1 ORDER BY ordinal_position",
        )
        .bind(table)
        .fetch_all(&pool)
        .await?;

        if columns.is_empty() {
            println!("- {} (missing, run the service once to migrate)", table);
            continue;
        }

        println!("- {}", table);
        for (col, type_, nullable) in columns {
            let marker = if nullable == "YES" { "?" } else { "" };
            println!("  - {}{}: {}", col, marker, type_);
        }
        println!();
    }

    for enum_name in CRM_ENUMS {
        let labels: Vec<(String,)> = sqlx::query_as(
            "SELECT e.enumlabel FROM pg_enum e JOIN pg_type t ON t.oid = e.enumtypid \
             WHERE t.typname = $1 ORDER BY e.enumsortorder",
        )
        .bind(enum_name)
        .fetch_all(&pool)
        .await?;

        let labels: Vec<String> = labels.into_iter().map(|(l,)| l).collect();
        println!("{}: {}", enum_name, labels.join(" | "));
    }

    Ok(())
}
