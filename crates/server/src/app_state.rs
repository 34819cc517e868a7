use site_api::ApiContext;

use crate::session::SessionConfig;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) api: ApiContext,
    pub(crate) session: SessionConfig,
}
