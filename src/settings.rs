use tracing::info;

use crate::access::validate_password;
use crate::api::ApiClient;
use crate::error::{AccessError, ValidationError};

#[derive(Debug, Clone)]
pub struct PasswordChangeForm {
    pub current: String,
    pub new: String,
    pub confirm: String,
}

impl PasswordChangeForm {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.current.is_empty() {
            return Err(ValidationError::Required("Current password"));
        }
        validate_password(&self.new)?;
        if self.new != self.confirm {
            return Err(ValidationError::PasswordMismatch);
        }
        if self.new == self.current {
            return Err(ValidationError::PasswordUnchanged);
        }
        Ok(())
    }
}

pub async fn change_password(
    client: &ApiClient,
    form: &PasswordChangeForm,
) -> Result<String, AccessError> {
    form.validate()?;
    let message = client.change_password(&form.current, &form.new).await?;
    info!("password changed");
    Ok(message)
}
