use recordgate_core::DEFAULT_TABLE_NAME;

/// How `update` and `delete` store calls complete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum MutationMode {
    /// The call is spawned and not awaited. The caller gets an `Accepted`
    /// response before the store has confirmed anything, and a failure is
    /// only logged.
    #[default]
    FireAndForget,
    /// The call is awaited and its result or failure returned, like
    /// `create` and `read`.
    Awaited,
}

/// Dispatcher configuration.
///
/// Controls which table every store-bound payload addresses and whether
/// mutations are awaited.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Injected as `TableName` into every non-echo payload.
    pub table_name: String,
    /// Completion mode for `update` and `delete`.
    pub mutation_mode: MutationMode,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            table_name: DEFAULT_TABLE_NAME.to_string(),
            mutation_mode: MutationMode::default(),
        }
    }
}
