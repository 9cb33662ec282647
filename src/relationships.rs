//! Naming-convention foreign keys.
//!
//! For every ordered pair of distinct tables `(a, b)`, a column of `a` named
//! `b_id` (or `customer_id` when `b` is `customers`) is assumed to reference
//! `b.id`. Nothing checks that `b.id` exists or that the types agree; the
//! store decides, and a rejected guess is logged and skipped.

use log::{info, warn};

use crate::{ddl::TableSchema, identifier::quote_identifier, store::SqlStore};

pub const REFERENCED_COLUMN: &str = "id";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyGuess {
    pub from_table: String,
    pub from_column: String,
    pub to_table: String,
}

impl ForeignKeyGuess {
    pub fn constraint_name(&self) -> String {
        format!("fk_{}_{}", self.from_table, self.from_column)
    }

    pub fn to_sql(&self) -> String {
        format!(
            "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({});",
            quote_identifier(&self.from_table),
            quote_identifier(&self.constraint_name()),
            quote_identifier(&self.from_column),
            quote_identifier(&self.to_table),
            quote_identifier(REFERENCED_COLUMN)
        )
    }
}

/// Column names that would reference `table`.
fn referencing_columns(table: &str) -> Vec<String> {
    let mut names = vec![format!("{table}_id")];
    if table.len() > 1
        && let Some(singular) = table.strip_suffix('s')
    {
        names.push(format!("{singular}_id"));
    }
    names
}

pub fn guess_foreign_keys(tables: &[TableSchema]) -> Vec<ForeignKeyGuess> {
    let mut guesses = Vec::new();
    for from in tables {
        for to in tables {
            if from.name() == to.name() {
                continue;
            }
            for candidate in referencing_columns(to.name()) {
                if from.has_column(&candidate) {
                    guesses.push(ForeignKeyGuess {
                        from_table: from.name().to_string(),
                        from_column: candidate,
                        to_table: to.name().to_string(),
                    });
                }
            }
        }
    }
    guesses
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FkReport {
    pub applied: Vec<ForeignKeyGuess>,
    pub rejected: Vec<ForeignKeyGuess>,
}

/// Runs each guess in its own transaction. A rejected guess is rolled back
/// and never stops the remaining ones.
pub fn apply_foreign_keys(store: &mut dyn SqlStore, guesses: &[ForeignKeyGuess]) -> FkReport {
    let mut report = FkReport::default();
    for guess in guesses {
        match store.run_transaction(&[guess.to_sql()]) {
            Ok(()) => {
                info!(
                    "Linked {}.{} -> {}.{REFERENCED_COLUMN}",
                    guess.from_table, guess.from_column, guess.to_table
                );
                report.applied.push(guess.clone());
            }
            Err(err) => {
                warn!(
                    "Skipping foreign key {}: {}",
                    guess.constraint_name(),
                    error_chain(&err)
                );
                report.rejected.push(guess.clone());
            }
        }
    }
    report
}

pub(crate) fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ddl::ColumnDef;
    use crate::inference::InferredType;

    fn table(name: &str, columns: &[&str]) -> TableSchema {
        TableSchema::from_columns(
            name,
            columns
                .iter()
                .map(|c| ColumnDef::new(*c, InferredType::Integer))
                .collect(),
        )
        .expect("schema")
    }

    #[test]
    fn orders_reference_customers_only_one_way() {
        let tables = vec![
            table("orders", &["id", "customer_id"]),
            table("customers", &["id", "name"]),
        ];
        let guesses = guess_foreign_keys(&tables);
        assert_eq!(
            guesses,
            vec![ForeignKeyGuess {
                from_table: "orders".to_string(),
                from_column: "customer_id".to_string(),
                to_table: "customers".to_string(),
            }]
        );
        assert_eq!(
            guesses[0].to_sql(),
            r#"ALTER TABLE "orders" ADD CONSTRAINT "fk_orders_customer_id" FOREIGN KEY ("customer_id") REFERENCES "customers" ("id");"#
        );
    }

    #[test]
    fn exact_table_name_suffix_matches() {
        let tables = vec![
            table("line_items", &["id", "inventory_id"]),
            table("inventory", &["id"]),
        ];
        let guesses = guess_foreign_keys(&tables);
        assert_eq!(guesses.len(), 1);
        assert_eq!(guesses[0].to_table, "inventory");
    }

    #[test]
    fn self_references_are_not_guessed() {
        let tables = vec![table("employees", &["id", "employee_id", "employees_id"])];
        assert!(guess_foreign_keys(&tables).is_empty());
    }

    #[test]
    fn every_matching_pair_is_reported() {
        let tables = vec![
            table("orders", &["id", "customer_id", "store_id"]),
            table("customers", &["id", "store_id"]),
            table("stores", &["id"]),
        ];
        let pairs: Vec<(String, String)> = guess_foreign_keys(&tables)
            .into_iter()
            .map(|g| (g.from_table, g.to_table))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("orders".to_string(), "customers".to_string()),
                ("orders".to_string(), "stores".to_string()),
                ("customers".to_string(), "stores".to_string()),
            ]
        );
    }
}
