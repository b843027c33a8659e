//! Evaluation environment
//!
//! One [`Environment`] lives for a single sheet evaluation. It owns a cache of
//! evaluated cells per page (page 0 is the local sheet, every resolved
//! external page gets the next key), the stack of cells currently being
//! evaluated, and the memo of external resolutions.

use crate::ast::ExternalReference;
use crate::error::{CellFailure, FormulaError, FormulaResult};
use crate::evaluator::{evaluate, EvaluationContext};
use crate::parser::parse_formula_with_depth;
use ahash::AHashMap;
use gridbook_core::{CellAddress, CellRange, CellValue, Grid, ValueType};
use lazy_regex::regex_is_match;
use std::borrow::Cow;
use std::collections::BTreeSet;
use tracing::{debug, trace};

/// Index of a page inside an [`Environment`]
pub type PageKey = usize;

/// The page being evaluated
pub const LOCAL_PAGE: PageKey = 0;

/// Result of evaluating one cell
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluatedCell {
    pub address: String,
    /// Raw text as stored in the grid
    pub raw: String,
    pub value: CellValue,
    /// Rendered value, or `#ERROR` / `#CYCLE`
    pub display: String,
    pub error: Option<CellFailure>,
    /// References read by the formula, sorted
    pub depends_on: Vec<String>,
}

impl EvaluatedCell {
    fn value(address: &str, raw: &str, value: CellValue, depends_on: Vec<String>) -> Self {
        Self {
            address: address.to_string(),
            raw: raw.to_string(),
            display: value.display(),
            value,
            error: None,
            depends_on,
        }
    }

    fn failed(address: &str, raw: &str, failure: CellFailure, depends_on: Vec<String>) -> Self {
        Self {
            address: address.to_string(),
            raw: raw.to_string(),
            value: CellValue::Empty,
            display: failure.kind.display().to_string(),
            error: Some(failure),
            depends_on,
        }
    }

    /// Type tag of the value (empty for errored cells)
    pub fn value_type(&self) -> ValueType {
        self.value.value_type()
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Whether the raw text is a formula
    pub fn is_formula(&self) -> bool {
        self.raw.trim_start().starts_with('=')
    }
}

/// A page returned by an [`ExternalResolver`]
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPage {
    pub page_id: String,
    pub page_title: String,
    pub grid: Grid,
}

/// Supplies other pages for `@[Label](id)` references
pub trait ExternalResolver {
    /// Resolve a reference to a page, or explain why it cannot be
    fn resolve(&mut self, reference: &ExternalReference) -> Result<ResolvedPage, String>;
}

impl<F> ExternalResolver for F
where
    F: FnMut(&ExternalReference) -> Result<ResolvedPage, String>,
{
    fn resolve(&mut self, reference: &ExternalReference) -> Result<ResolvedPage, String> {
        self(reference)
    }
}

/// Optional ceilings on evaluation work; both are off by default
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvaluationLimits {
    /// Largest range a single reference may span
    pub max_range_cells: Option<u64>,
    /// Deepest formula nesting, and longest chain of cells evaluating each other
    pub max_depth: Option<usize>,
}

struct Page<'a> {
    id: Option<String>,
    title: Option<String>,
    /// Reference text that first resolved this page
    reference: Option<String>,
    grid: Cow<'a, Grid>,
    cache: AHashMap<String, EvaluatedCell>,
}

/// Evaluation state for one sheet evaluation
pub struct Environment<'a> {
    pages: Vec<Page<'a>>,
    page_ids: AHashMap<String, PageKey>,
    resolutions: AHashMap<String, Result<PageKey, String>>,
    ancestors: Vec<(PageKey, String)>,
    resolver: Option<&'a mut dyn ExternalResolver>,
    limits: EvaluationLimits,
}

impl<'a> Environment<'a> {
    /// Create an environment over the local grid
    pub fn new(grid: &'a Grid) -> Self {
        Self {
            pages: vec![Page {
                id: None,
                title: None,
                reference: None,
                grid: Cow::Borrowed(grid),
                cache: AHashMap::new(),
            }],
            page_ids: AHashMap::new(),
            resolutions: AHashMap::new(),
            ancestors: Vec::new(),
            resolver: None,
            limits: EvaluationLimits::default(),
        }
    }

    /// Identify the local page, so references back to it reuse its cache
    pub fn with_page(mut self, id: Option<String>, title: Option<String>) -> Self {
        if let Some(id) = &id {
            self.page_ids.insert(id.clone(), LOCAL_PAGE);
        }
        self.pages[LOCAL_PAGE].id = id;
        self.pages[LOCAL_PAGE].title = title;
        self
    }

    pub fn with_resolver(mut self, resolver: &'a mut dyn ExternalResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn with_limits(mut self, limits: EvaluationLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Number of pages known so far (the local page included)
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Title of a page, if it has one
    pub fn page_title(&self, page: PageKey) -> Option<&str> {
        self.pages.get(page).and_then(|p| p.title.as_deref())
    }

    /// Identifier of a page, if it has one
    pub fn page_id(&self, page: PageKey) -> Option<&str> {
        self.pages.get(page).and_then(|p| p.id.as_deref())
    }

    /// Evaluate a cell of the local page
    pub fn evaluate_local(&mut self, address: &CellAddress) -> EvaluatedCell {
        self.evaluate_cell(LOCAL_PAGE, address)
    }

    /// Evaluate a cell, reusing the page cache
    pub fn evaluate_cell(&mut self, page: PageKey, address: &CellAddress) -> EvaluatedCell {
        let key = address.to_a1_string();

        if let Some(cached) = self.pages.get(page).and_then(|p| p.cache.get(&key)) {
            return cached.clone();
        }

        let raw = self
            .pages
            .get(page)
            .and_then(|p| p.grid.get(&key))
            .unwrap_or_default()
            .to_string();

        // Transient results below are not cached: they depend on the path
        if let Some(start) = self
            .ancestors
            .iter()
            .position(|(p, a)| *p == page && *a == key)
        {
            let details: BTreeSet<String> = self.ancestors[start..]
                .iter()
                .map(|(p, a)| self.describe(*p, a))
                .collect();
            debug!(page, address = %key, cycle = ?details, "circular reference detected");
            return EvaluatedCell::failed(
                &key,
                &raw,
                CellFailure::circular(details.into_iter().collect()),
                Vec::new(),
            );
        }

        if let Some(max) = self.limits.max_depth {
            if self.ancestors.len() >= max {
                let failure = FormulaError::LimitExceeded(format!(
                    "Reference chain is deeper than {} cells",
                    max
                ))
                .failure();
                return EvaluatedCell::failed(&key, &raw, failure, Vec::new());
            }
        }

        trace!(page, address = %key, "evaluating cell");
        self.ancestors.push((page, key.clone()));
        let result = self.compute(page, &key, &raw);
        self.ancestors.pop();

        if let Some(p) = self.pages.get_mut(page) {
            p.cache.insert(key, result.clone());
        }
        result
    }

    /// Classify raw text and evaluate it
    fn compute(&mut self, page: PageKey, key: &str, raw: &str) -> EvaluatedCell {
        let trimmed = raw.trim();

        if trimmed.is_empty() {
            return EvaluatedCell::value(key, raw, CellValue::Empty, Vec::new());
        }

        if let Some(source) = trimmed.strip_prefix('=') {
            let expr = match parse_formula_with_depth(source, self.limits.max_depth) {
                Ok(expr) => expr,
                Err(e) => return EvaluatedCell::failed(key, raw, e.failure(), Vec::new()),
            };
            let extent = self.pages.get(page).map(|p| p.grid.extent());
            let depends_on = expr.references_within(self.limits.max_range_cells, extent.as_ref());

            let mut scope = PageScope { env: self, page };
            return match evaluate(&expr, &mut scope) {
                Ok(value) => EvaluatedCell::value(key, raw, value, depends_on),
                Err(e) => EvaluatedCell::failed(key, raw, e.failure(), depends_on),
            };
        }

        if is_number_literal(trimmed) {
            if let Ok(n) = trimmed.parse::<f64>() {
                return EvaluatedCell::value(key, raw, CellValue::Number(n), Vec::new());
            }
        }

        EvaluatedCell::value(key, raw, CellValue::String(raw.to_string()), Vec::new())
    }

    /// How a cell is named in cycle details
    fn describe(&self, page: PageKey, address: &str) -> String {
        match self.pages.get(page).and_then(|p| p.reference.as_deref()) {
            Some(reference) if page != LOCAL_PAGE => format!("{}:{}", reference, address),
            _ => address.to_string(),
        }
    }

    /// Resolve an external reference to a page, memoizing the outcome
    fn resolve_page(&mut self, reference: &ExternalReference) -> Result<PageKey, String> {
        let memo_key = reference.resolution_key();
        if let Some(outcome) = self.resolutions.get(&memo_key) {
            return outcome.clone();
        }

        let resolved = match self.resolver.as_deref_mut() {
            Some(resolver) => resolver.resolve(reference),
            None => Err(format!(
                "Cannot resolve external reference '{}': no resolver configured",
                reference.label
            )),
        };

        let outcome = match resolved {
            Ok(page) => Ok(self.register_page(page, reference)),
            Err(message) => {
                debug!(reference = %reference.raw, %message, "external reference failed");
                Err(message)
            }
        };

        self.resolutions.insert(memo_key, outcome.clone());
        outcome
    }

    fn register_page(&mut self, resolved: ResolvedPage, reference: &ExternalReference) -> PageKey {
        if let Some(&existing) = self.page_ids.get(&resolved.page_id) {
            debug!(reference = %reference.raw, page = existing, "external reference reuses page");
            return existing;
        }

        let key = self.pages.len();
        debug!(
            reference = %reference.raw,
            page_id = %resolved.page_id,
            page = key,
            "registered external page"
        );
        self.page_ids.insert(resolved.page_id.clone(), key);
        self.pages.push(Page {
            id: Some(resolved.page_id),
            title: Some(resolved.page_title),
            reference: Some(reference.raw.clone()),
            grid: Cow::Owned(resolved.grid.sanitize()),
            cache: AHashMap::new(),
        });
        key
    }
}

/// Whether trimmed raw text is a bare number literal
pub fn is_number_literal(text: &str) -> bool {
    regex_is_match!(r"^-?(\d+\.?\d*|\.\d+)$", text)
}

/// Evaluation context bound to one page of an environment
struct PageScope<'e, 'a> {
    env: &'e mut Environment<'a>,
    page: PageKey,
}

impl PageScope<'_, '_> {
    fn lookup(&mut self, page: PageKey, address: &CellAddress) -> FormulaResult<CellValue> {
        let cell = self.env.evaluate_cell(page, address);
        match cell.error {
            Some(failure) => Err(FormulaError::Cell(failure)),
            None => Ok(cell.value),
        }
    }
}

impl EvaluationContext for PageScope<'_, '_> {
    fn cell(&mut self, address: &CellAddress) -> FormulaResult<CellValue> {
        self.lookup(self.page, address)
    }

    fn external_cell(
        &mut self,
        reference: &ExternalReference,
        address: &CellAddress,
    ) -> FormulaResult<CellValue> {
        let page = self
            .env
            .resolve_page(reference)
            .map_err(FormulaError::Reference)?;
        self.lookup(page, address)
    }

    fn max_range_cells(&self) -> Option<u64> {
        self.env.limits.max_range_cells
    }

    fn page_extent(
        &mut self,
        reference: Option<&ExternalReference>,
    ) -> FormulaResult<Option<CellRange>> {
        let page = match reference {
            Some(reference) => self
                .env
                .resolve_page(reference)
                .map_err(FormulaError::Reference)?,
            None => self.page,
        };
        Ok(self.env.pages.get(page).map(|p| p.grid.extent()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use gridbook_core::CellUpdate;
    use pretty_assertions::assert_eq;

    fn grid(cells: &[(&str, &str)]) -> Grid {
        let mut grid = Grid::new(10, 5);
        let updates: Vec<_> = cells.iter().map(|(a, v)| CellUpdate::new(*a, *v)).collect();
        grid.apply_updates(&updates).unwrap();
        grid
    }

    fn addr(s: &str) -> CellAddress {
        CellAddress::parse(s).unwrap()
    }

    #[test]
    fn test_literal_classification() {
        let g = grid(&[("A1", " 42 "), ("A2", "-.5"), ("A3", "1e3"), ("A4", "hello")]);
        let mut env = Environment::new(&g);
        assert_eq!(env.evaluate_local(&addr("A1")).value, CellValue::Number(42.0));
        assert_eq!(env.evaluate_local(&addr("A2")).value, CellValue::Number(-0.5));
        assert_eq!(env.evaluate_local(&addr("A3")).value, CellValue::from("1e3"));
        assert_eq!(env.evaluate_local(&addr("A4")).display, "hello");
        assert_eq!(env.evaluate_local(&addr("A5")).value, CellValue::Empty);
    }

    #[test]
    fn test_formula_with_dependencies() {
        let g = grid(&[("A1", "5"), ("B1", "=A1+3")]);
        let mut env = Environment::new(&g);
        let b1 = env.evaluate_local(&addr("B1"));
        assert_eq!(b1.value, CellValue::Number(8.0));
        assert_eq!(b1.display, "8");
        assert_eq!(b1.depends_on, vec!["A1"]);
        assert!(b1.is_formula());
    }

    #[test]
    fn test_failed_formula_keeps_dependencies() {
        let g = grid(&[("A1", "0"), ("B1", "=10/A1")]);
        let mut env = Environment::new(&g);
        let b1 = env.evaluate_local(&addr("B1"));
        assert_eq!(b1.display, "#ERROR");
        assert_eq!(b1.error.as_ref().unwrap().message, "Division by zero");
        assert_eq!(b1.depends_on, vec!["A1"]);
    }

    #[test]
    fn test_parse_error_is_cell_local() {
        let g = grid(&[("A1", "=1+"), ("A2", "=SUM(")]);
        let mut env = Environment::new(&g);
        assert_eq!(env.evaluate_local(&addr("A1")).display, "#ERROR");
        assert_eq!(env.evaluate_local(&addr("A2")).display, "#ERROR");
    }

    #[test]
    fn test_cycle_detection() {
        let g = grid(&[("A1", "=B1"), ("B1", "=A1"), ("C1", "=A1*2")]);
        let mut env = Environment::new(&g);

        for cell in ["A1", "B1", "C1"] {
            let result = env.evaluate_local(&addr(cell));
            let failure = result.error.expect("cycle error");
            assert_eq!(failure.kind, ErrorKind::CircularReference);
            assert_eq!(failure.message, "Circular reference detected");
            assert_eq!(failure.details, vec!["A1", "B1"]);
            assert_eq!(result.display, "#CYCLE");
        }
    }

    #[test]
    fn test_self_reference() {
        let g = grid(&[("A1", "=A1+1")]);
        let mut env = Environment::new(&g);
        let a1 = env.evaluate_local(&addr("A1"));
        assert_eq!(a1.error.unwrap().details, vec!["A1"]);
        assert_eq!(a1.depends_on, vec!["A1"]);
    }

    #[test]
    fn test_iferror_catches_cycle() {
        let g = grid(&[("A1", "=IFERROR(A1, 0)")]);
        let mut env = Environment::new(&g);
        assert_eq!(env.evaluate_local(&addr("A1")).value, CellValue::Number(0.0));
    }

    #[test]
    fn test_external_reference_without_resolver() {
        let g = grid(&[("A1", "=@[Other Page]:A1")]);
        let mut env = Environment::new(&g);
        let a1 = env.evaluate_local(&addr("A1"));
        assert_eq!(
            a1.error.unwrap().message,
            "Cannot resolve external reference 'Other Page': no resolver configured"
        );
        assert_eq!(a1.depends_on, vec!["@[Other Page]:A1"]);
    }

    #[test]
    fn test_external_reference_resolution_is_memoized() {
        let g = grid(&[("A1", "=@[Other](page2):A1+5"), ("A2", "=@[Other](page2):A2")]);
        let other = grid(&[("A1", "10"), ("A2", "=A1*2")]);
        let mut calls = 0;
        let mut resolver = |reference: &ExternalReference| -> Result<ResolvedPage, String> {
            calls += 1;
            assert_eq!(reference.identifier.as_deref(), Some("page2"));
            Ok(ResolvedPage {
                page_id: "page2".to_string(),
                page_title: "Other".to_string(),
                grid: other.clone(),
            })
        };

        {
            let mut env = Environment::new(&g).with_resolver(&mut resolver);
            assert_eq!(env.evaluate_local(&addr("A1")).value, CellValue::Number(15.0));
            assert_eq!(env.evaluate_local(&addr("A2")).value, CellValue::Number(20.0));
            assert_eq!(env.page_count(), 2);
            assert_eq!(env.page_title(1), Some("Other"));
        }
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_resolver_error_is_memoized() {
        let g = grid(&[("A1", "=@[Gone]:A1"), ("A2", "=@[ gone ]:B1")]);
        let mut calls = 0;
        let mut resolver = |_: &ExternalReference| -> Result<ResolvedPage, String> {
            calls += 1;
            Err("page not found".to_string())
        };

        {
            let mut env = Environment::new(&g).with_resolver(&mut resolver);
            assert_eq!(
                env.evaluate_local(&addr("A1")).error.unwrap().message,
                "page not found"
            );
            assert!(env.evaluate_local(&addr("A2")).is_error());
        }
        // Both labels normalize to "gone"
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_reference_to_local_page_shares_cache() {
        let g = grid(&[("A1", "7"), ("B1", "=@[Me](self):A1")]);
        let mut resolver = |_: &ExternalReference| -> Result<ResolvedPage, String> {
            Ok(ResolvedPage {
                page_id: "self".to_string(),
                page_title: "Me".to_string(),
                grid: Grid::default(),
            })
        };
        let mut env = Environment::new(&g)
            .with_page(Some("self".to_string()), Some("Me".to_string()))
            .with_resolver(&mut resolver);
        assert_eq!(env.evaluate_local(&addr("B1")).value, CellValue::Number(7.0));
        assert_eq!(env.page_count(), 1);
    }

    #[test]
    fn test_cross_page_cycle() {
        let g = grid(&[("A1", "=@[Other](p2):A1")]);
        let other = grid(&[("A1", "=@[Back](p1):A1")]);
        let mut resolver = |reference: &ExternalReference| -> Result<ResolvedPage, String> {
            let page = match reference.identifier.as_deref() {
                Some("p2") => ResolvedPage {
                    page_id: "p2".to_string(),
                    page_title: "Other".to_string(),
                    grid: other.clone(),
                },
                Some("p1") => ResolvedPage {
                    page_id: "p1".to_string(),
                    page_title: "Home".to_string(),
                    grid: Grid::default(),
                },
                _ => return Err("unknown".to_string()),
            };
            Ok(page)
        };
        let mut env = Environment::new(&g)
            .with_page(Some("p1".to_string()), None)
            .with_resolver(&mut resolver);
        let failure = env.evaluate_local(&addr("A1")).error.unwrap();
        assert_eq!(failure.kind, ErrorKind::CircularReference);
        assert_eq!(failure.details, vec!["@[Other](p2):A1", "A1"]);
    }

    #[test]
    fn test_double_equals_is_a_parse_error() {
        let g = grid(&[("A1", "==1+1")]);
        let mut env = Environment::new(&g);
        let a1 = env.evaluate_local(&addr("A1"));
        assert_eq!(a1.value, CellValue::Empty);
        assert_eq!(a1.display, "#ERROR");
        assert_eq!(a1.error.unwrap().kind, ErrorKind::Evaluation);
    }

    #[test]
    fn test_huge_range_reads_only_the_grid() {
        let g = grid(&[("A1", "=COUNT(A2:XFD1048576)"), ("B2", "1"), ("A3", "2")]);
        let mut env = Environment::new(&g);
        let a1 = env.evaluate_local(&addr("A1"));
        assert_eq!(a1.error, None);
        assert_eq!(a1.value, CellValue::Number(2.0));
        // Dependencies stop at the grid bounds too: A2:E10
        assert_eq!(a1.depends_on.len(), 45);
    }

    #[test]
    fn test_huge_external_range() {
        let g = grid(&[("A1", "=COUNT(@[Data]:A1:XFD1048576)")]);
        let data = grid(&[("A1", "1"), ("C4", "3"), ("D4", "text")]);
        let mut resolver = |_: &ExternalReference| -> Result<ResolvedPage, String> {
            Ok(ResolvedPage {
                page_id: "data".to_string(),
                page_title: "Data".to_string(),
                grid: data.clone(),
            })
        };
        let mut env = Environment::new(&g).with_resolver(&mut resolver);
        let a1 = env.evaluate_local(&addr("A1"));
        assert_eq!(a1.value, CellValue::Number(2.0));
        assert_eq!(a1.depends_on, vec!["@[Data]:A1:XFD1048576"]);
    }

    #[test]
    fn test_range_outside_grid_reads_blank() {
        let g = grid(&[("A1", "=SUM(Z100:Z200)"), ("A2", "=Z100:Z101")]);
        let mut env = Environment::new(&g);
        assert_eq!(env.evaluate_local(&addr("A1")).value, CellValue::Number(0.0));
        assert_eq!(env.evaluate_local(&addr("A2")).value, CellValue::Empty);
    }

    #[test]
    fn test_depth_limit() {
        let g = grid(&[("A1", "=A2"), ("A2", "=A3"), ("A3", "=A4"), ("A4", "1")]);
        let mut env = Environment::new(&g).with_limits(EvaluationLimits {
            max_depth: Some(2),
            ..Default::default()
        });
        let a1 = env.evaluate_local(&addr("A1"));
        assert!(a1.error.unwrap().message.contains("deeper than 2"));
    }
}
