use serde::{Deserialize, Serialize};

use crate::transpiler::conditions::ConverterRegistry;
use crate::transpiler::sql::mysql::{self, MysqlGenerator};
use crate::transpiler::sql::postgres::{self, PostgresGenerator};
use crate::transpiler::traits::SqlGenerator;
use crate::translator::{ExceptionTranslator, MysqlTranslator, PostgresTranslator};

/// Supported SQL dialects.
///
/// Chosen by configuration, never negotiated with the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Postgres,
    #[serde(alias = "mariadb")]
    MySQL,
}

impl Dialect {
    pub fn generator(&self) -> Box<dyn SqlGenerator> {
        match self {
            Dialect::Postgres => Box::new(PostgresGenerator),
            Dialect::MySQL => Box::new(MysqlGenerator),
        }
    }

    /// The dialect's default converter registry.
    pub fn registry(&self) -> ConverterRegistry {
        match self {
            Dialect::Postgres => postgres::registry(),
            Dialect::MySQL => mysql::registry(),
        }
    }

    pub fn translator(&self) -> Box<dyn ExceptionTranslator> {
        match self {
            Dialect::Postgres => Box::new(PostgresTranslator),
            Dialect::MySQL => Box::new(MysqlTranslator),
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dialect::Postgres => write!(f, "postgres"),
            Dialect::MySQL => write!(f, "mysql"),
        }
    }
}

impl std::str::FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Dialect::Postgres),
            "mysql" | "mariadb" => Ok(Dialect::MySQL),
            other => Err(format!("Unknown dialect '{}'. Expected: postgres or mysql", other)),
        }
    }
}
