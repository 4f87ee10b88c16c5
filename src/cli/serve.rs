use crate::db::db_path;
use crate::error::Result;
use crate::settings::load_settings;

pub fn run(bind: Option<String>) -> Result<()> {
    let mut settings = load_settings();
    if let Some(bind) = bind {
        settings.server_bind = bind;
    }
    let path = db_path();
    super::open_db()?;

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(crate::server::serve(settings, path))
}
