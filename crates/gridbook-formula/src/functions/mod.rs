//! Built-in functions
//!
//! Every function receives its arguments already evaluated, with ranges
//! flattened row-major. `IF` and `IFERROR` are not registered here; they
//! need unevaluated arguments and live in [`logical`].

pub mod date;
pub mod info;
pub mod logical;
pub mod math;
pub mod statistical;
pub mod text;

use crate::error::{FormulaError, FormulaResult};
use crate::evaluator::to_number;
use gridbook_core::CellValue;
use std::collections::HashMap;

/// Function implementation signature
pub type FunctionImpl = fn(&[CellValue]) -> FormulaResult<CellValue>;

/// Function definition
pub struct FunctionDef {
    /// Function name (uppercase)
    pub name: &'static str,
    /// Minimum arguments
    pub min_args: usize,
    /// Maximum arguments (None = unlimited)
    pub max_args: Option<usize>,
    /// Implementation
    pub implementation: FunctionImpl,
}

impl FunctionDef {
    /// Check a flattened argument count against the declared arity
    pub fn check_arity(&self, count: usize) -> FormulaResult<()> {
        let expected = match self.max_args {
            Some(0) if count > 0 => count_words(0),
            Some(max) if max == self.min_args && count != max => {
                format!("exactly {}", count_words(max))
            }
            _ if count < self.min_args => format!("at least {}", count_words(self.min_args)),
            Some(max) if count > max => format!("at most {}", count_words(max)),
            _ => return Ok(()),
        };

        Err(FormulaError::argument_count(self.name, expected))
    }
}

fn count_words(n: usize) -> String {
    let word = match n {
        0 => return "no arguments".to_string(),
        1 => return "one argument".to_string(),
        2 => "two",
        3 => "three",
        4 => "four",
        _ => return format!("{} arguments", n),
    };
    format!("{} arguments", word)
}

/// Function registry
pub struct FunctionRegistry {
    functions: HashMap<&'static str, FunctionDef>,
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FunctionRegistry {
    /// Create a new registry with all built-in functions
    pub fn new() -> Self {
        let mut registry = Self {
            functions: HashMap::new(),
        };

        registry.register_math_functions();
        registry.register_statistical_functions();
        registry.register_text_functions();
        registry.register_logical_functions();
        registry.register_info_functions();
        registry.register_date_functions();

        registry
    }

    /// Look up a function by name
    pub fn get(&self, name: &str) -> Option<&FunctionDef> {
        self.functions.get(name.to_ascii_uppercase().as_str())
    }

    /// Names of every registered function, sorted
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.functions.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Register a function
    pub fn register(&mut self, def: FunctionDef) {
        self.functions.insert(def.name, def);
    }

    fn add(
        &mut self,
        name: &'static str,
        min_args: usize,
        max_args: Option<usize>,
        implementation: FunctionImpl,
    ) {
        self.register(FunctionDef {
            name,
            min_args,
            max_args,
            implementation,
        });
    }

    fn register_math_functions(&mut self) {
        self.add("SUM", 1, None, math::fn_sum);
        self.add("ABS", 1, Some(1), math::fn_abs);
        self.add("ROUND", 1, Some(2), math::fn_round);
        self.add("FLOOR", 1, Some(2), math::fn_floor);
        self.add("CEILING", 1, Some(2), math::fn_ceiling);
        self.add("SQRT", 1, Some(1), math::fn_sqrt);
        self.add("POWER", 2, Some(2), math::fn_power);
        self.add("POW", 2, Some(2), math::fn_power);
        self.add("MOD", 2, Some(2), math::fn_mod);
        self.add("INT", 1, Some(1), math::fn_int);
        self.add("SIGN", 1, Some(1), math::fn_sign);
        self.add("PI", 0, Some(0), math::fn_pi);
        self.add("RAND", 0, Some(0), math::fn_rand);
        self.add("RANDBETWEEN", 2, Some(2), math::fn_randbetween);
    }

    fn register_statistical_functions(&mut self) {
        self.add("AVERAGE", 1, None, statistical::fn_average);
        self.add("AVG", 1, None, statistical::fn_average);
        self.add("MIN", 1, None, statistical::fn_min);
        self.add("MAX", 1, None, statistical::fn_max);
        self.add("COUNT", 1, None, statistical::fn_count);
        self.add("COUNTA", 1, None, statistical::fn_counta);
    }

    fn register_text_functions(&mut self) {
        self.add("CONCAT", 1, None, text::fn_concat);
        self.add("CONCATENATE", 1, None, text::fn_concat);
        self.add("UPPER", 1, Some(1), text::fn_upper);
        self.add("LOWER", 1, Some(1), text::fn_lower);
        self.add("TRIM", 1, Some(1), text::fn_trim);
        self.add("LEN", 1, Some(1), text::fn_len);
        self.add("LEFT", 1, Some(2), text::fn_left);
        self.add("RIGHT", 1, Some(2), text::fn_right);
        self.add("MID", 3, Some(3), text::fn_mid);
        self.add("SUBSTITUTE", 3, Some(4), text::fn_substitute);
        self.add("REPT", 2, Some(2), text::fn_rept);
        self.add("FIND", 2, Some(3), text::fn_find);
        self.add("SEARCH", 2, Some(3), text::fn_search);
    }

    fn register_logical_functions(&mut self) {
        self.add("AND", 1, None, logical::fn_and);
        self.add("OR", 1, None, logical::fn_or);
        self.add("NOT", 1, Some(1), logical::fn_not);
    }

    fn register_info_functions(&mut self) {
        self.add("ISBLANK", 1, Some(1), info::fn_isblank);
        self.add("ISNUMBER", 1, Some(1), info::fn_isnumber);
        self.add("ISTEXT", 1, Some(1), info::fn_istext);
    }

    fn register_date_functions(&mut self) {
        self.add("TODAY", 0, Some(0), date::fn_today);
        self.add("NOW", 0, Some(0), date::fn_now);
        self.add("YEAR", 1, Some(1), date::fn_year);
        self.add("MONTH", 1, Some(1), date::fn_month);
        self.add("DAY", 1, Some(1), date::fn_day);
    }
}

// === Argument helpers ===

/// Numeric argument at `index`; missing arguments read as blank
pub(crate) fn number_arg(args: &[CellValue], index: usize) -> FormulaResult<f64> {
    args.get(index).map_or(Ok(0.0), to_number)
}

/// Optional numeric argument with a default
pub(crate) fn optional_number_arg(
    args: &[CellValue],
    index: usize,
    default: f64,
) -> FormulaResult<f64> {
    match args.get(index) {
        None => Ok(default),
        Some(value) => to_number(value),
    }
}

/// Display form of the argument at `index`
pub(crate) fn text_arg(args: &[CellValue], index: usize) -> String {
    args.get(index).map(CellValue::display).unwrap_or_default()
}
