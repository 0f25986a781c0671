use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParrmError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Insufficient data: need {needed} samples, have {available}")]
    InsufficientData { needed: usize, available: usize },

    #[error(
        "No suitable filter can be created with the requested settings: {0}. \
         Relax `omit_n_samples`, `period_half_width`, or `filter_half_width`."
    )]
    NoSuitableFilter(String),

    #[error("The artefact period has not been estimated yet; call `find_period` first")]
    PeriodNotEstimated,

    #[error("The filter has not been created yet; call `create_filter` first")]
    FilterNotCreated,

    #[error("No data has been filtered yet; call `filter_data` first")]
    DataNotFiltered,

    #[error("Analysis settings have not been established yet; call `find_period` first")]
    SettingsNotEstablished,

    #[error("Worker pool error: {0}")]
    WorkerPool(String),
}

pub type Result<T> = std::result::Result<T, ParrmError>;
