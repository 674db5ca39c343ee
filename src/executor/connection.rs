use std::{fmt, sync::Arc};

use crate::{
    config::Config,
    error::{QueryError, Result},
    executor::StatementExecutor,
    grammar::{Grammar, MySqlGrammar, SqliteGrammar},
    query::{Builder, Source},
};

/// The environment a builder runs in: dialect, optional executor and conventions.
///
/// Cloning is cheap; every builder derived from a connection shares the same
/// grammar, executor and config.
#[derive(Clone)]
pub struct Connection {
    grammar: Arc<dyn Grammar>,
    executor: Option<Arc<dyn StatementExecutor>>,
    config: Arc<Config>,
}

impl Default for Connection {
    fn default() -> Self {
        Self::new(MySqlGrammar)
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("grammar", &self.grammar.name())
            .field("executor", &self.executor.is_some())
            .field("config", &self.config)
            .finish()
    }
}

impl Connection {
    pub fn new(grammar: impl Grammar + 'static) -> Self {
        Self { grammar: Arc::new(grammar), executor: None, config: Arc::new(Config::default()) }
    }

    pub fn mysql() -> Self {
        Self::new(MySqlGrammar)
    }

    pub fn sqlite() -> Self {
        Self::new(SqliteGrammar)
    }

    pub fn with_executor(mut self, executor: impl StatementExecutor + 'static) -> Self {
        self.executor = Some(Arc::new(executor));
        self
    }

    pub fn with_shared_executor(mut self, executor: Arc<dyn StatementExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = Arc::new(config);
        self
    }

    pub fn grammar(&self) -> &dyn Grammar {
        self.grammar.as_ref()
    }

    pub fn executor(&self) -> Result<&dyn StatementExecutor> {
        self.executor.as_deref().ok_or(QueryError::MissingExecutor)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn query(&self) -> Builder {
        Builder::with_connection(self.clone())
    }

    /// A builder targeting `table`.
    pub fn table(&self, table: impl Into<Source>) -> Builder {
        self.query().from(table)
    }
}
