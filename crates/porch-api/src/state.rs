use std::sync::Arc;

use porch_db::Database;
use porch_gateway::{ConnectionRegistry, Dispatcher};
use porch_social::conversation::ConversationLog;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub dispatcher: Dispatcher,
    pub conversations: ConversationLog,
    pub jwt_secret: String,
}

impl AppStateInner {
    /// Wire the dispatcher and conversation log to one database.
    pub fn new(db: Arc<Database>, jwt_secret: String) -> AppState {
        let dispatcher = Dispatcher::new(ConnectionRegistry::new(), db.clone());
        let conversations =
            ConversationLog::new(db.clone(), db.clone(), Arc::new(dispatcher.clone()));

        Arc::new(Self {
            db,
            dispatcher,
            conversations,
            jwt_secret,
        })
    }
}
