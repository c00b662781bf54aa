use std::path::Path;

use crate::backend::Backend;
use crate::error::Result;
use crate::{Binary, FormatHint};

/// Which backend to try first for a hint, and which one to fall back on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub primary: Backend,
    pub fallback: Option<Backend>,
}

/// The fallback rule table.
///
/// goblin is authoritative for ELF: when the caller insists on ELF, a goblin
/// failure is final. PE never goes through goblin.
pub fn route(hint: FormatHint) -> Route {
    match hint {
        FormatHint::Auto => Route {
            primary: Backend::Elf,
            fallback: Some(Backend::Multi),
        },
        FormatHint::Elf => Route {
            primary: Backend::Elf,
            fallback: None,
        },
        FormatHint::Pe => Route {
            primary: Backend::Multi,
            fallback: None,
        },
    }
}

/// Runs the route for `hint` through `invoke`.
///
/// The fallback's result is returned as is, so a failure of the last backend
/// tried always reaches the caller.
pub fn dispatch<T, F>(hint: FormatHint, mut invoke: F) -> Result<T>
where
    F: FnMut(Backend) -> Result<T>,
{
    let route = route(hint);
    match invoke(route.primary) {
        Ok(loaded) => Ok(loaded),
        Err(e) => match route.fallback {
            Some(fallback) => {
                log::debug!("{} failed: {}", route.primary, e);
                log::info!("falling back to the {} backend", fallback);
                invoke(fallback)
            }
            None => Err(e),
        },
    }
}

/// Loads the binary at `path`, choosing backends according to `hint`.
pub fn load<P: AsRef<Path>>(path: P, hint: FormatHint) -> Result<Binary> {
    let path = path.as_ref();
    log::debug!("loading {} (format hint: {})", path.display(), hint);

    let bin = dispatch(hint, |backend| backend.load(path))?;

    log::info!(
        "loaded {}: {}/{} {}-bit, {} section(s), {} symbol(s)",
        bin.filename,
        bin.format,
        bin.arch_name,
        bin.bits,
        bin.sections.len(),
        bin.symbols.len()
    );
    Ok(bin)
}
