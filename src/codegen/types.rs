//! C type mapping, nil sentinels and literal formatting.

use super::Codegen;
use crate::ast::{DefaultValue, ValueType};

impl Codegen {
    /// C type for a value, using the user type name for structs and enums.
    pub(crate) fn c_type(&self, ty: ValueType, type_name: &str) -> String {
        match ty {
            ValueType::Number => "double".to_owned(),
            ValueType::String => "char*".to_owned(),
            ValueType::Bool => "int".to_owned(),
            ValueType::Inferred => "double".to_owned(),
            ValueType::Function => "void*".to_owned(),
            ValueType::Struct => {
                if type_name.is_empty() {
                    "void*".to_owned()
                } else {
                    type_name.to_owned()
                }
            }
            ValueType::Enum => {
                if type_name.is_empty() {
                    "int".to_owned()
                } else {
                    type_name.to_owned()
                }
            }
        }
    }

    /// C type for a declared variable. Optional structs are modeled as a
    /// numeric sentinel slot.
    pub(crate) fn c_type_for_var(&self, name: &str) -> String {
        match self.symbol_table.get(name) {
            Some(info) => {
                if info.ty == ValueType::Struct && info.is_optional {
                    "double".to_owned()
                } else {
                    self.c_type(info.ty, &info.struct_type_name)
                }
            }
            None => "double".to_owned(),
        }
    }

    /// The `<type>` infix used by the `hl_print_*` / `hl_is_nil_*` runtime
    /// families.
    pub(crate) fn print_type_name(&self, ty: ValueType) -> &'static str {
        match ty {
            ValueType::Number => "number",
            ValueType::String => "string",
            ValueType::Bool => "bool",
            ValueType::Inferred => "number",
            ValueType::Function => "function",
            ValueType::Struct => "struct",
            ValueType::Enum => "enum",
        }
    }

    /// Nil sentinel in value positions.
    pub(crate) fn nil_sentinel(&self, ty: ValueType) -> &'static str {
        match ty {
            ValueType::String => "NULL",
            ValueType::Bool | ValueType::Enum => "-1",
            _ => "HL_NIL_NUMBER",
        }
    }

    /// Nil sentinel in argument positions (`NULL` needs the char* cast).
    pub(crate) fn nil_sentinel_arg(&self, ty: ValueType) -> &'static str {
        match ty {
            ValueType::String => "(char*)0",
            ValueType::Bool | ValueType::Enum => "-1",
            _ => "HL_NIL_NUMBER",
        }
    }

    /// A C expression testing whether `name` holds the nil sentinel.
    pub(crate) fn nil_check(&self, name: &str, ty: ValueType) -> String {
        match ty {
            ValueType::String => format!("({} == NULL)", name),
            ValueType::Bool => format!("({} == -1)", name),
            _ => format!("isnan({})", name),
        }
    }

    /// Format a double literal: up to 9 decimals, trailing zeros trimmed.
    pub(crate) fn double_to_string(&self, value: f64) -> String {
        let mut result = format!("{:.9}", value);
        if result.contains('.') {
            while result.ends_with('0') {
                result.pop();
            }
            if result.ends_with('.') {
                result.pop();
            }
        }
        result
    }

    /// Lower a field default literal; `ty` drives nil sentinels and the
    /// integer suffix (enums stay plain ints).
    pub(crate) fn default_value_c(&self, default: &DefaultValue, ty: ValueType) -> String {
        match default {
            DefaultValue::Int(n) => {
                if ty == ValueType::Enum {
                    n.to_string()
                } else {
                    format!("{}.0", n)
                }
            }
            DefaultValue::Float(x) => self.double_to_string(*x),
            DefaultValue::Str(s) => format!("\"{}\"", s),
            DefaultValue::Bool(b) => (if *b { "1" } else { "0" }).to_owned(),
            DefaultValue::Nil => match ty {
                ValueType::Enum => "-1".to_owned(),
                ValueType::Number => "HL_NIL_NUMBER".to_owned(),
                ValueType::String => "NULL".to_owned(),
                ValueType::Bool => "-1".to_owned(),
                _ => "0".to_owned(),
            },
        }
    }

    /// Value for a struct field the constructor did not receive: the
    /// default if present, the nil sentinel if optional, a zero otherwise.
    pub(crate) fn missing_field_value(
        &self,
        default: Option<&DefaultValue>,
        ty: ValueType,
        optional: bool,
    ) -> String {
        if let Some(default) = default {
            return self.default_value_c(default, ty);
        }
        if optional {
            return match ty {
                ValueType::Enum => "-1",
                ValueType::Number => "HL_NIL_NUMBER",
                ValueType::String => "NULL",
                ValueType::Bool => "-1",
                _ => "0",
            }
            .to_owned();
        }
        match ty {
            ValueType::Enum => "0",
            ValueType::Number => "0.0",
            ValueType::String => "\"\"",
            ValueType::Bool => "0",
            _ => "0",
        }
        .to_owned()
    }
}
