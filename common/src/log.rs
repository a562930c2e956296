//! Process-wide logger initialization, built on `tracing`'s own global
//! subscriber rather than a bespoke logger trait — a caller installs it
//! once before constructing a `RowStreamer` and every module's `tracing`
//! calls flow through it from then on.

use once_cell::sync::OnceCell;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

static INIT: OnceCell<()> = OnceCell::new();

/// Installs a global `tracing` subscriber writing to stdout. Safe to call
/// more than once; only the first call takes effect.
pub fn init_tracing(debug: bool) {
    INIT.get_or_init(|| {
        let level = if debug { Level::DEBUG } else { Level::INFO };
        let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
        // A caller may have already installed a subscriber of their own;
        // that's not our failure to report.
        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}
