use std::sync::Arc;

use dialogue::BotRouter;
use storage::Storage;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) storage: Storage,
    pub(crate) bot: Arc<BotRouter>,
}
