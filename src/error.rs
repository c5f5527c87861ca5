use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum BridgeError {
    #[error("Identifier too long ({len} > {max} bytes): {value}")]
    NameTooLong {
        value: String,
        len: usize,
        max: usize,
    },

    #[error("Discovery length mismatch on {topic}: declared {declared}, streamed {streamed}")]
    LengthMismatch {
        topic: String,
        declared: usize,
        streamed: usize,
    },

    #[error("Publish already in progress on {0}")]
    PublishInProgress(String),

    #[error("No publish in progress")]
    NoPublishInProgress,

    #[error("MQTT transport error: {0}")]
    Transport(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid MAC address: {0}")]
    InvalidMacAddress(String),

    #[error("Sensor registry full (max {0} sensors)")]
    RegistryFull(usize),

    #[error("Pin {pin} is reserved and cannot be used by {variant}")]
    ReservedPin { pin: i8, variant: String },

    #[error("Pin {pin} is out of range for {variant}")]
    PinOutOfRange { pin: i8, variant: String },

    #[error("{variant} needs all of its pins wired")]
    MissingPin { variant: String },

    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    SerdeJsonError(#[from] serde_json::Error),
}

impl From<rumqttc::ClientError> for BridgeError {
    fn from(e: rumqttc::ClientError) -> Self {
        BridgeError::Transport(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
