//! Error types for bulkmodel operations.

use std::fmt;

/// The primary error type for all bulkmodel operations.
#[derive(Debug)]
pub enum Error {
    /// Query execution errors reported by a driver
    Query(QueryError),
    /// Type conversion errors
    Type(TypeError),
    /// Transaction errors
    Transaction(TransactionError),
    /// Configuration errors
    Config(ConfigError),
    /// Validation errors raised while flattening an entity graph
    Validation(ValidationError),
    /// Bulk mapping and bulk write errors
    Bulk(BulkError),
    /// Operation was cancelled via asupersync
    Cancelled,
    /// Custom error with message
    Custom(String),
}

#[derive(Debug)]
pub struct QueryError {
    pub kind: QueryErrorKind,
    pub sql: Option<String>,
    pub sqlstate: Option<String>,
    /// Driver-native error number (SQL Server `number`, MySQL error code)
    pub code: Option<i32>,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

/// SQL Server unique key/index, foreign key/check and NOT NULL violations.
const SQLSERVER_CONSTRAINT_CODES: [i32; 4] = [2627, 2601, 547, 515];

/// MySQL duplicate entry, foreign key, NOT NULL and check violations.
const MYSQL_CONSTRAINT_CODES: [i32; 5] = [1062, 1451, 1452, 1048, 3819];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorKind {
    /// Syntax error in SQL
    Syntax,
    /// Constraint violation (unique, foreign key, not null, check)
    Constraint,
    /// Table or column not found
    NotFound,
    /// Deadlock detected
    Deadlock,
    /// Serialization failure (retry may succeed)
    Serialization,
    /// Statement timeout
    Timeout,
    /// Other database error
    Database,
}

#[derive(Debug)]
pub struct TypeError {
    pub expected: &'static str,
    pub actual: String,
    pub column: Option<String>,
}

/// A transaction could not be finished; the connection may still hold it open.
#[derive(Debug)]
pub struct TransactionError {
    pub message: String,
}

#[derive(Debug)]
pub struct ConfigError {
    pub message: String,
}

/// The bulk-operation error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkErrorKind {
    /// Flattened columns don't match the target table or entity schema
    SchemaMismatch,
    /// A row violates a database constraint
    ConstraintViolation,
    /// A batch exceeds a backend row or parameter limit
    BatchTooLarge,
    /// A required owned entity is absent
    MissingRequiredOwnedEntity,
    /// A stored integer doesn't name any member of its enumeration
    InvalidEnumValue,
    /// The selected backend doesn't offer the requested bulk primitive
    BackendUnsupportedOperation,
}

impl BulkErrorKind {
    /// Stable name for logs and messages.
    pub const fn as_str(self) -> &'static str {
        match self {
            BulkErrorKind::SchemaMismatch => "SchemaMismatch",
            BulkErrorKind::ConstraintViolation => "ConstraintViolation",
            BulkErrorKind::BatchTooLarge => "BatchTooLarge",
            BulkErrorKind::MissingRequiredOwnedEntity => "MissingRequiredOwnedEntity",
            BulkErrorKind::InvalidEnumValue => "InvalidEnumValue",
            BulkErrorKind::BackendUnsupportedOperation => "BackendUnsupportedOperation",
        }
    }
}

#[derive(Debug)]
pub struct BulkError {
    pub kind: BulkErrorKind,
    pub message: String,
    /// Target table, when known
    pub table: Option<String>,
    /// Offending flattened column, when known
    pub column: Option<String>,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl BulkError {
    /// Create a bulk error of the given kind.
    pub fn new(kind: BulkErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            table: None,
            column: None,
            source: None,
        }
    }

    pub fn schema_mismatch(message: impl Into<String>) -> Self {
        Self::new(BulkErrorKind::SchemaMismatch, message)
    }

    pub fn constraint_violation(message: impl Into<String>) -> Self {
        Self::new(BulkErrorKind::ConstraintViolation, message)
    }

    pub fn batch_too_large(message: impl Into<String>) -> Self {
        Self::new(BulkErrorKind::BatchTooLarge, message)
    }

    pub fn missing_owned(path: impl Into<String>) -> Self {
        let path = path.into();
        Self::new(
            BulkErrorKind::MissingRequiredOwnedEntity,
            format!("required owned entity '{path}' is not set"),
        )
    }

    pub fn invalid_enum(enum_name: &str, value: i64) -> Self {
        Self::new(
            BulkErrorKind::InvalidEnumValue,
            format!("{value} is not a member of enum {enum_name}"),
        )
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::new(BulkErrorKind::BackendUnsupportedOperation, message)
    }

    /// Attach the target table name.
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Attach the flattened column name.
    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    /// Attach the underlying cause.
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

/// Validation error for values rejected while flattening.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub errors: Vec<FieldValidationError>,
}

/// A single validation error for a flattened column.
#[derive(Debug, Clone)]
pub struct FieldValidationError {
    pub field: String,
    pub kind: ValidationErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// Non-nullable column received NULL
    Required,
    /// Value doesn't fit the declared column type
    Type,
}

impl ValidationError {
    /// Create a new empty validation error container.
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    /// Check if there are any validation errors.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Add a field validation error.
    pub fn add(
        &mut self,
        field: impl Into<String>,
        kind: ValidationErrorKind,
        message: impl Into<String>,
    ) {
        self.errors.push(FieldValidationError {
            field: field.into(),
            kind,
            message: message.into(),
        });
    }

    /// Add a required field error.
    pub fn add_required(&mut self, field: impl Into<String>) {
        self.add(field, ValidationErrorKind::Required, "is required");
    }

    /// Add a type mismatch error.
    pub fn add_type(&mut self, field: impl Into<String>, expected: &str, actual: &str) {
        self.add(
            field,
            ValidationErrorKind::Type,
            format!("expected {expected}, got {actual}"),
        );
    }

    /// Convert to Result, returning Ok(()) if no errors, Err(self) otherwise.
    pub fn into_result(self) -> std::result::Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl Default for ValidationError {
    fn default() -> Self {
        Self::new()
    }
}

impl Error {
    /// Is this a retryable error (deadlock, serialization failure, timeout)?
    ///
    /// Upserts are idempotent, so retrying the whole call is always safe.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Query(q) => matches!(
                q.kind,
                QueryErrorKind::Deadlock | QueryErrorKind::Serialization | QueryErrorKind::Timeout
            ),
            _ => false,
        }
    }

    /// The bulk taxonomy kind, if this is a bulk error.
    pub fn bulk_kind(&self) -> Option<BulkErrorKind> {
        match self {
            Error::Bulk(b) => Some(b.kind),
            _ => None,
        }
    }
}

impl QueryError {
    /// Does this error report a constraint violation?
    ///
    /// Drivers don't always classify errors, so SQLSTATE class 23 and the
    /// SQL Server / MySQL constraint error numbers count as well.
    pub fn is_constraint_violation(&self) -> bool {
        if self.kind == QueryErrorKind::Constraint {
            return true;
        }
        if self.sqlstate.as_deref().is_some_and(|state| state.starts_with("23")) {
            return true;
        }
        self.code.is_some_and(|code| {
            SQLSERVER_CONSTRAINT_CODES.contains(&code) || MYSQL_CONSTRAINT_CODES.contains(&code)
        })
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Query(e) => write!(f, "Query error: {}", e),
            Error::Type(e) => write!(f, "Type error: {}", e),
            Error::Transaction(e) => write!(f, "Transaction error: {}", e.message),
            Error::Config(e) => write!(f, "Configuration error: {}", e.message),
            Error::Validation(e) => write!(f, "Validation error: {}", e),
            Error::Bulk(e) => write!(f, "Bulk error: {}", e),
            Error::Cancelled => write!(f, "Operation cancelled"),
            Error::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Query(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Bulk(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            _ => None,
        }
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(sqlstate) = &self.sqlstate {
            write!(f, "{} (SQLSTATE {})", self.message, sqlstate)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl std::error::Error for QueryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|err| err as &(dyn std::error::Error + 'static))
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(col) = &self.column {
            write!(
                f,
                "expected {} for column '{}', found {}",
                self.expected, col, self.actual
            )
        } else {
            write!(f, "expected {}, found {}", self.expected, self.actual)
        }
    }
}

impl fmt::Display for BulkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.as_str(), self.message)?;
        if let Some(table) = &self.table {
            write!(f, " (table '{}')", table)?;
        }
        if let Some(column) = &self.column {
            write!(f, " (column '{}')", column)?;
        }
        Ok(())
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.errors.is_empty() {
            write!(f, "validation passed")
        } else if self.errors.len() == 1 {
            let err = &self.errors[0];
            write!(f, "validation error on '{}': {}", err.field, err.message)
        } else {
            writeln!(f, "validation errors:")?;
            for err in &self.errors {
                writeln!(f, "  - {}: {}", err.field, err.message)?;
            }
            Ok(())
        }
    }
}

impl std::error::Error for ValidationError {}

impl From<QueryError> for Error {
    fn from(err: QueryError) -> Self {
        Error::Query(err)
    }
}

impl From<TypeError> for Error {
    fn from(err: TypeError) -> Self {
        Error::Type(err)
    }
}

impl From<TransactionError> for Error {
    fn from(err: TransactionError) -> Self {
        Error::Transaction(err)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err)
    }
}

impl From<ValidationError> for Error {
    fn from(err: ValidationError) -> Self {
        Error::Validation(err)
    }
}

impl From<BulkError> for Error {
    fn from(err: BulkError) -> Self {
        Error::Bulk(err)
    }
}

/// Result type alias for bulkmodel operations.
pub type Result<T> = std::result::Result<T, Error>;
