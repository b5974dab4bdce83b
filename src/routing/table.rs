//! The ordered route table.
//!
//! # Design Decisions
//! - Re-sorted after every insertion, most specific first
//! - The sort is stable, so equal scores keep registration order
//! - Lookup is a linear scan; first match wins
//! - Tables are cheap to clone (routes are shared `Arc`s), which lets the
//!   dispatcher publish a fresh copy on each change

use std::sync::Arc;

use axum::http::Method;

use crate::routing::pattern::PathParams;
use crate::routing::route::{Route, RouteSummary};

/// A successful lookup.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    pub route: Arc<Route>,
    pub params: PathParams,
}

#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<Arc<Route>>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert and restore descending-score order.
    pub fn insert(&mut self, route: Arc<Route>) {
        self.routes.push(route);
        self.routes.sort_by(|a, b| b.score().cmp(&a.score()));
    }

    /// First route accepting `method` whose pattern matches `path`.
    pub fn find(&self, method: &Method, path: &str) -> Option<RouteMatch> {
        self.routes
            .iter()
            .filter(|route| route.accepts(method))
            .find_map(|route| {
                route.match_path(path).map(|params| RouteMatch {
                    route: Arc::clone(route),
                    params,
                })
            })
    }

    pub fn clear(&mut self) {
        self.routes.clear();
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Routes in dispatch order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Route>> {
        self.routes.iter()
    }

    pub fn summaries(&self) -> Vec<RouteSummary> {
        self.routes.iter().map(|route| route.summary()).collect()
    }
}
