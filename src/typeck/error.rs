//! Type error definitions.
//!
//! Every error the checker can produce, with the user-visible message as
//! the `Display` form. Errors carry the offending source line so the CLI
//! can render them with surrounding context.

use crate::ast::ValueType;
use std::fmt;
use thiserror::Error;

/// A type checking error: what went wrong plus where
#[derive(Debug, Clone, PartialEq)]
pub struct TypeError {
    pub kind: TypeErrorKind,
    pub line: u32,
}

impl TypeError {
    pub fn new(kind: TypeErrorKind, line: u32) -> Self {
        Self { kind, line }
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl std::error::Error for TypeError {}

/// The kind of type error
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TypeErrorKind {
    // ============ Type declarations ============
    #[error("Struct '{0}' is already defined")]
    DuplicateStruct(String),

    #[error("Class '{0}' is already defined")]
    DuplicateClass(String),

    #[error("Type '{0}' is already declared")]
    DuplicateTypeName(String),

    #[error("Duplicate field name '{field}' in struct '{owner}'")]
    DuplicateStructField { field: String, owner: String },

    #[error("Duplicate field name '{field}' in class '{owner}'")]
    DuplicateClassField { field: String, owner: String },

    #[error("Duplicate method name '{method}' in class '{owner}'")]
    DuplicateMethod { method: String, owner: String },

    #[error("Method cannot be named '__init' - this is reserved for constructors")]
    ReservedInitName,

    #[error("Class field '{0}' must have explicit type")]
    FieldNeedsType(String),

    #[error("Unknown type '{type_name}' for field '{field}'")]
    UnknownFieldType { type_name: String, field: String },

    #[error("Struct field '{0}' missing type name")]
    FieldMissingTypeName(String),

    #[error("Default value type mismatch for field '{field}': expected {expected}, got {got}")]
    StaticDefaultMismatch {
        field: String,
        expected: ValueType,
        got: ValueType,
    },

    #[error("Enum '{owner}' has duplicate value '{value}'")]
    DuplicateEnumValue { owner: String, value: String },

    // ============ Variables ============
    #[error("Variable '{0}' is already declared")]
    VarAlreadyDeclared(String),

    #[error("Variable '{0}' is not declared")]
    VarNotDeclared(String),

    #[error("Unknown type '{type_name}' for variable '{var}'")]
    UnknownVarType { type_name: String, var: String },

    #[error("Variable '{0}' must be initialized or have an explicit type")]
    MustInitialize(String),

    #[error("Non-optional variable '{name}' must be initialized. Either provide a value or use optional type (e.g., 'local {name}: {ty}?')")]
    NonOptionalNeedsInit { name: String, ty: ValueType },

    #[error("Type mismatch: variable declared as '{declared}' but initialized with '{actual}'")]
    DeclTypeMismatch { declared: String, actual: String },

    #[error("Cannot assign function to variable of type {0}")]
    LambdaTypeMismatch(ValueType),

    #[error("Cannot assign to const variable '{0}'")]
    AssignToConst(String),

    #[error("Cannot assign nil to non-optional variable '{0}'")]
    AssignNilToNonOptional(String),

    #[error("Type mismatch: cannot assign {value_ty} to variable '{var}' of type {var_ty}")]
    AssignTypeMismatch {
        value_ty: ValueType,
        var: String,
        var_ty: ValueType,
    },

    #[error("Type mismatch: cannot assign {value_ty} to variable '{var}' of type {var_ty}?")]
    AssignTypeMismatchOptional {
        value_ty: ValueType,
        var: String,
        var_ty: ValueType,
    },

    #[error("Cannot use compound assignment on optional variable '{0}' that might be nil. Use force unwrap (!) or check for nil first")]
    CompoundOnNilable(String),

    #[error("Compound assignment requires number types")]
    CompoundNeedsNumbers,

    // ============ Functions ============
    #[error("Function '{0}' is already declared")]
    FunctionAlreadyDeclared(String),

    #[error("Function '{0}' is not declared")]
    FunctionNotDeclared(String),

    #[error("Parameter '{param}' in function '{function}' must have an explicit type annotation (e.g., '{param}: number')")]
    ParamNeedsType { param: String, function: String },

    #[error("Lambda parameter '{0}' must have explicit type")]
    LambdaParamNeedsType(String),

    #[error("Nested function '{0}' cannot be marked as global")]
    NestedFunctionGlobal(String),

    #[error("{0}")]
    ConflictingReturns(String),

    #[error("Function '{function}' declared to return {declared} but actually returns {actual}")]
    ReturnTypeMismatch {
        function: String,
        declared: ValueType,
        actual: ValueType,
    },

    #[error("tostring() expects exactly 1 argument")]
    TostringArity,

    #[error("tonumber() expects exactly 1 argument")]
    TonumberArity,

    #[error("tonumber() expects a string argument")]
    TonumberArg,

    #[error("type() expects exactly 1 argument")]
    TypeArity,

    // ============ Classes and methods ============
    #[error("Class '{0}' is not defined")]
    ClassNotDefined(String),

    #[error("Struct/Class '{0}' is not defined")]
    StructNotDefined(String),

    #[error("Cannot construct class '{0}' with struct syntax; use '{0}(...)'")]
    BraceConstructedClass(String),

    #[error("Method parameter '{0}' must have explicit type")]
    MethodParamNeedsType(String),

    #[error("Duplicate parameter name '{param}' in method '{method}'")]
    DuplicateParam { param: String, method: String },

    #[error("Struct parameter '{param}' in method '{method}' missing type information.")]
    StructParamMissingType { param: String, method: String },

    #[error("Unknown type '{type_name}' for parameter '{param}'")]
    UnknownParamType { type_name: String, param: String },

    #[error("Constructor cannot have explicit return type")]
    CtorExplicitReturn,

    #[error("Constructor cannot return a value")]
    CtorReturnsValue,

    #[error("Method '{0}' has conflicting return types")]
    MethodConflictingReturns(String),

    #[error("Public field '{field}' of class '{owner}' is not initialized in the constructor. Add 'self.{field} = <value>' in __init")]
    UninitializedField { field: String, owner: String },

    #[error("Method '{method}' does not exist in class '{owner}'")]
    NoSuchMethod { method: String, owner: String },

    #[error("Cannot call private method '{method}' from outside class '{owner}'")]
    PrivateMethod { method: String, owner: String },

    #[error("Cannot determine object type for method call '{0}'")]
    MethodObjectUnknown(String),

    #[error("Cannot determine class type for method call '{0}'")]
    MethodClassUnknown(String),

    // ============ Fields ============
    #[error("Cannot access field on non-struct/class type")]
    FieldOnNonStruct,

    #[error("Cannot determine type for field assignment")]
    FieldAssignTargetUnknown,

    #[error("Cannot determine container type for field '{0}'")]
    FieldContainerUnknown(String),

    #[error("Struct '{owner}' has no field '{field}'")]
    NoSuchStructField { owner: String, field: String },

    #[error("Class '{owner}' has no field '{field}'")]
    NoSuchClassField { owner: String, field: String },

    #[error("Cannot access private field '{field}' from outside class '{owner}'")]
    PrivateField { field: String, owner: String },

    #[error("Field '{field}' is not static in class '{owner}'")]
    FieldNotStatic { field: String, owner: String },

    #[error("Type mismatch: cannot assign {value_ty} to field of type {field_ty}")]
    FieldTypeMismatch {
        value_ty: ValueType,
        field_ty: ValueType,
    },

    #[error("Cannot assign to const field '{0}' outside of constructor")]
    ConstFieldOutsideCtor(String),

    #[error("Const field '{0}' can only be assigned once in constructor")]
    ConstFieldReassigned(String),

    #[error("Unknown struct/class type '{0}'")]
    UnknownContainerType(String),

    // ============ Expressions ============
    #[error("Cannot print optional variable '{0}' that might be nil. Use force unwrap (!) or check for nil first")]
    PrintOptional(String),

    #[error("Left side of ?? must be an optional type")]
    NilCoalesceNonOptional,

    #[error("Left operand must be a number")]
    LeftOperandNumber,

    #[error("Right operand must be a number")]
    RightOperandNumber,

    #[error("Cannot concatenate {0} value")]
    NotStringifiable(ValueType),

    #[error("Cannot compare {left} with {right}")]
    CannotCompare { left: ValueType, right: ValueType },

    #[error("Cannot negate non-numeric value")]
    CannotNegate,

    #[error("Cannot force unwrap (!) non-optional value")]
    ForceUnwrapNonOptional,
}
