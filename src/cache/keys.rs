use std::fmt;

use crate::domain::access::{Operation, SheetTarget};

/// Composite cache key; renders as `read:<spreadsheetId>:<range>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    operation: Operation,
    target: SheetTarget,
}

impl CacheKey {
    pub fn new(operation: Operation, target: SheetTarget) -> Self {
        Self { operation, target }
    }

    pub fn read(target: &SheetTarget) -> Self {
        Self::new(Operation::Read, target.clone())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.operation,
            self.target.spreadsheet_id(),
            self.target.range()
        )
    }
}
