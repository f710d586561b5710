use crate::core::{AppError, AppResult, DocId};
use crate::web::SessionHandle;

/// Login state carried by the request session.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSessionConcept;

impl WebSessionConcept {
    pub fn start(&self, session: &SessionHandle, user: DocId) -> AppResult<()> {
        self.is_logged_out(session)?;
        session.set_user(Some(user));
        Ok(())
    }

    pub fn end(&self, session: &SessionHandle) -> AppResult<()> {
        self.get_user(session)?;
        session.set_user(None);
        Ok(())
    }

    pub fn get_user(&self, session: &SessionHandle) -> AppResult<DocId> {
        session
            .user()
            .ok_or_else(|| AppError::unauthorized("Must be logged in!"))
    }

    pub fn is_logged_out(&self, session: &SessionHandle) -> AppResult<()> {
        if session.user().is_some() {
            return Err(AppError::forbidden("Must be logged out!"));
        }
        Ok(())
    }
}
