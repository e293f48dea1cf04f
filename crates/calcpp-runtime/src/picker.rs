#![forbid(unsafe_code)]

//! Variable and function picker data.
//!
//! The picker views list constants and functions the user can insert. The
//! only state they keep is the last viewed function category, which lives
//! in a [`PickerSession`] owned by the calculator.

/// A predefined constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Variable {
    /// Text inserted into the expression.
    pub name: &'static str,
    /// Value shown next to the name.
    pub value: &'static str,
    pub description: &'static str,
}

impl Variable {
    /// `name = value`, as listed in the picker.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{} = {}", self.name, self.value)
    }
}

pub const VARIABLES: &[Variable] = &[
    Variable {
        name: "π",
        value: "3.141592653589793",
        description: "Ratio of a circle's circumference to its diameter",
    },
    Variable {
        name: "e",
        value: "2.718281828459045",
        description: "Base of the natural logarithm",
    },
    Variable {
        name: "i",
        value: "√(-1)",
        description: "Imaginary unit",
    },
    Variable {
        name: "c",
        value: "299792458",
        description: "Speed of light in vacuum, m/s",
    },
    Variable {
        name: "G",
        value: "6.673848E-11",
        description: "Gravitational constant",
    },
    Variable {
        name: "h",
        // 6.6260695729E-34 / 2π
        value: "1.0545717257978387E-34",
        description: "Reduced Planck constant",
    },
];

/// Looks up a constant by its inserted name.
#[must_use]
pub fn variable(name: &str) -> Option<&'static Variable> {
    VARIABLES.iter().find(|v| v.name == name)
}

// ---------------------------------------------------------------------------
// Functions
// ---------------------------------------------------------------------------

/// A named group of functions, shown as one picker tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionCategory {
    pub title: &'static str,
    pub functions: &'static [&'static str],
}

pub const FUNCTION_CATEGORIES: &[FunctionCategory] = &[
    FunctionCategory {
        title: "Common",
        functions: &[
            "abs", "conjugate", "cubic", "deg", "dms", "exp", "im", "lg", "ln", "log", "rad",
            "re", "sgn", "√", "√3", "√4", "√n",
        ],
    },
    FunctionCategory {
        title: "Trigonometric",
        functions: &["sin", "cos", "tan", "cot", "asin", "acos", "atan", "acot"],
    },
    FunctionCategory {
        title: "Comparison",
        functions: &["ap", "eq", "ge", "gt", "le", "lt", "ne"],
    },
    FunctionCategory {
        title: "Hyperbolic",
        functions: &[
            "sinh", "cosh", "tanh", "coth", "asinh", "acosh", "atanh", "acoth",
        ],
    },
    FunctionCategory {
        title: "Operators",
        functions: &["x!", "x!!", "x%", "mod", "x°"],
    },
    FunctionCategory {
        title: "Derivatives",
        functions: &["∂", "∫", "∫ab"],
    },
    FunctionCategory {
        title: "Other",
        functions: &["Σ", "∏"],
    },
];

/// Argument hint shown after a function name.
#[must_use]
pub fn argument_hint(name: &str) -> &'static str {
    match name {
        "dms" => "(d, m, s)",
        "log" => "(base, x)",
        "rad" => "(x, y, z)",
        "√n" => "(x, n)",
        "ap" | "eq" | "ge" | "gt" | "le" | "lt" | "ne" | "mod" => "(x, y)",
        "x!" | "x!!" | "x%" | "x°" => "",
        "∂" => "(f(x), x, x_point, order)",
        "∫" => "(f(x), x)",
        "∫ab" => "(f(x), x, a, b)",
        "Σ" | "∏" => "(f(i), i, from, to)",
        _ => "(x)",
    }
}

/// Name plus argument hint, as listed in the picker.
#[must_use]
pub fn function_label(name: &str) -> String {
    format!("{name}{}", argument_hint(name))
}

/// Picker state carried across visits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PickerSession {
    function_page: usize,
}

impl PickerSession {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of the last viewed function category.
    #[must_use]
    pub const fn function_page(&self) -> usize {
        self.function_page
    }

    /// Switch tabs; out-of-range pages are clamped to the last category.
    pub fn set_function_page(&mut self, page: usize) {
        self.function_page = page.min(FUNCTION_CATEGORIES.len() - 1);
    }

    #[must_use]
    pub fn current_category(&self) -> &'static FunctionCategory {
        &FUNCTION_CATEGORIES[self.function_page.min(FUNCTION_CATEGORIES.len() - 1)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reduced_planck_value_matches_computation() {
        let h = 6.626_069_572_9E-34 / (2.0 * std::f64::consts::PI);
        assert_eq!(format!("{h:E}"), variable("h").unwrap().value);
    }

    #[test]
    fn variable_labels() {
        assert_eq!(variable("c").unwrap().label(), "c = 299792458");
        assert!(variable("x").is_none());
    }

    #[test]
    fn argument_hints() {
        assert_eq!(function_label("sin"), "sin(x)");
        assert_eq!(function_label("log"), "log(base, x)");
        assert_eq!(function_label("x!"), "x!");
        assert_eq!(function_label("Σ"), "Σ(f(i), i, from, to)");
    }

    #[test]
    fn session_remembers_and_clamps_page() {
        let mut session = PickerSession::new();
        assert_eq!(session.current_category().title, "Common");
        session.set_function_page(5);
        assert_eq!(session.current_category().functions, &["∂", "∫", "∫ab"]);
        session.set_function_page(99);
        assert_eq!(session.function_page(), FUNCTION_CATEGORIES.len() - 1);
    }

    #[test]
    fn sessions_are_independent() {
        let mut a = PickerSession::new();
        let b = PickerSession::new();
        a.set_function_page(2);
        assert_eq!(b.function_page(), 0);
    }
}
