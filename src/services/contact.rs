use crate::database::contact_message_repository::{ContactMessage, NewContactMessage};
use crate::database::error::DatabaseError;
use crate::database::repository::ContactMessageStore;
use crate::logging::mask_email;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ContactForm {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub message: String,
}

pub struct ContactService {
    messages: Arc<dyn ContactMessageStore>,
}

impl ContactService {
    pub fn new(messages: Arc<dyn ContactMessageStore>) -> Self {
        Self { messages }
    }

    /// Fields are stored exactly as submitted
    pub async fn submit(&self, form: ContactForm) -> Result<ContactMessage, DatabaseError> {
        let message = self
            .messages
            .create(NewContactMessage {
                name: form.name,
                email: form.email,
                phone: form.phone,
                message: form.message,
            })
            .await?;

        info!(
            message_id = message.id,
            email = %mask_email(&message.email),
            "Contact message received"
        );
        Ok(message)
    }
}
