use std::fmt;

/// Outcome codes for every index, iterator and transaction operation.
///
/// All errors cross API boundaries as a [`Status`] value; there is no
/// second error channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Code {
    Ok,
    /// The transaction could not be committed and was rolled back instead.
    TransactionAborted,
    /// The operation was not completed because of a lack of free memory.
    OutOfMemory,
    /// The substrate detected a conflict; the caller must retry the whole
    /// transaction.
    Deadlock,
    /// An index with the given name already exists.
    IndexExists,
    /// The requested index does not exist or has been closed already.
    UnknownIndex,
    /// The iterator has been closed already.
    IteratorClosed,
    /// The requested record was not found (or a range was exhausted).
    NotFound,
    /// The transaction handle has been committed or aborted already.
    TransactionClosed,
    /// The record or key does not match the index schema.
    IncompatibleRecord,
    /// The index still has uncommitted writers and cannot be deleted.
    OpenTransactions,
    /// Unspecified failure.
    GenericFailure,
}

#[derive(Debug, Clone)]
pub struct Status {
    code: Code,
    message: Option<String>,
}

impl Status {
    pub fn ok() -> Self {
        Status {
            code: Code::Ok,
            message: None,
        }
    }

    pub fn transaction_aborted(msg: impl Into<String>) -> Self {
        Status {
            code: Code::TransactionAborted,
            message: Some(msg.into()),
        }
    }

    pub fn out_of_memory(msg: impl Into<String>) -> Self {
        Status {
            code: Code::OutOfMemory,
            message: Some(msg.into()),
        }
    }

    pub fn deadlock(msg: impl Into<String>) -> Self {
        Status {
            code: Code::Deadlock,
            message: Some(msg.into()),
        }
    }

    pub fn index_exists(msg: impl Into<String>) -> Self {
        Status {
            code: Code::IndexExists,
            message: Some(msg.into()),
        }
    }

    pub fn unknown_index(msg: impl Into<String>) -> Self {
        Status {
            code: Code::UnknownIndex,
            message: Some(msg.into()),
        }
    }

    pub fn iterator_closed(msg: impl Into<String>) -> Self {
        Status {
            code: Code::IteratorClosed,
            message: Some(msg.into()),
        }
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Status {
            code: Code::NotFound,
            message: Some(msg.into()),
        }
    }

    pub fn transaction_closed(msg: impl Into<String>) -> Self {
        Status {
            code: Code::TransactionClosed,
            message: Some(msg.into()),
        }
    }

    pub fn incompatible_record(msg: impl Into<String>) -> Self {
        Status {
            code: Code::IncompatibleRecord,
            message: Some(msg.into()),
        }
    }

    pub fn open_transactions(msg: impl Into<String>) -> Self {
        Status {
            code: Code::OpenTransactions,
            message: Some(msg.into()),
        }
    }

    pub fn generic_failure(msg: impl Into<String>) -> Self {
        Status {
            code: Code::GenericFailure,
            message: Some(msg.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code == Code::Ok
    }

    pub fn is_not_found(&self) -> bool {
        self.code == Code::NotFound
    }

    pub fn is_deadlock(&self) -> bool {
        self.code == Code::Deadlock
    }

    pub fn code(&self) -> &Code {
        &self.code
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(msg) => write!(f, "{:?}: {}", self.code, msg),
            None => write!(f, "{:?}", self.code),
        }
    }
}

impl std::error::Error for Status {}

pub type Result<T> = std::result::Result<T, Status>;
