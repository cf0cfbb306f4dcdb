// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::Agent;

/// Exposes the text a row is filtered on.
pub trait FilterField {
    fn filter_value(&self) -> &str;
}

impl FilterField for Agent {
    fn filter_value(&self) -> &str {
        &self.name
    }
}

/// Case-insensitive substring filter bound to a single text input.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RowFilter {
    query: String,
    query_lc: String,
}

impl RowFilter {
    pub fn new(query: impl Into<String>) -> Self {
        let mut filter = Self::default();
        filter.set_query(query);
        filter
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn is_active(&self) -> bool {
        !self.query.is_empty()
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        self.query = query.into();
        self.query_lc = self.query.to_lowercase();
    }

    pub fn push_char(&mut self, ch: char) {
        self.query.push(ch);
        self.query_lc = self.query.to_lowercase();
    }

    pub fn pop_char(&mut self) -> bool {
        let popped = self.query.pop().is_some();
        self.query_lc = self.query.to_lowercase();
        popped
    }

    pub fn matches<T: FilterField + ?Sized>(&self, row: &T) -> bool {
        self.query_lc.is_empty() || row.filter_value().to_lowercase().contains(&self.query_lc)
    }

    /// Keeps matching rows in their original order.
    pub fn apply<'a, T: FilterField>(&self, rows: &'a [T]) -> Vec<&'a T> {
        rows.iter().filter(|row| self.matches(*row)).collect()
    }
}
