use crate::domain::entities::StoredMessage;
use crate::domain::errors::SerializationError;
use crate::ports::outbound::MessageSerializer;

/// Default archived value codec using bincode.
#[derive(Debug, Default, Clone, Copy)]
pub struct BincodeMessageSerializer;

impl MessageSerializer for BincodeMessageSerializer {
    fn serialize(&self, message: &StoredMessage) -> Result<Vec<u8>, SerializationError> {
        bincode::serialize(message).map_err(|e| SerializationError {
            message: e.to_string(),
        })
    }

    fn deserialize(&self, data: &[u8]) -> Result<StoredMessage, SerializationError> {
        bincode::deserialize(data).map_err(|e| SerializationError {
            message: e.to_string(),
        })
    }
}
