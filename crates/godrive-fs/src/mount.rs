//! Mount lifecycle: bring every configured mountpoint up, hold them until
//! they release, and force-unmount everything on shutdown signals.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use fuser::MountOption;
use gdrive::query::Query;
use gdrive::{DriveClient, HttpClient};
use nix::errno::Errno;
use tokio::runtime::Runtime;
use tracing::{debug, error, info, warn};

use crate::entry::Owner;
use crate::fs::{EntryCache, FsCore, ENTRY_CACHE_CAPACITY};
use crate::fuse::DriveFuse;
use crate::remote::DriveRemote;

/// Local mount directory → remote Drive path.
pub type Mountpoints = HashMap<String, String>;

/// Mount every pair and block until all of them have been unmounted.
///
/// Failures are per-mountpoint: a path that does not resolve, a directory
/// that cannot be created, or a mount that fails is logged and skipped
/// while the rest proceed. SIGINT or SIGTERM force-unmounts everything
/// concurrently; this function returns once every mount has released.
pub fn mount_all<C: HttpClient + 'static>(
    runtime: &Runtime,
    client: DriveClient<C>,
    mounts: &Mountpoints,
) {
    let remote = Arc::new(DriveRemote::new(client.clone()));
    let entries: Arc<EntryCache> = Arc::new(EntryCache::new(ENTRY_CACHE_CAPACITY));
    let owner = Owner::current();

    let mut sessions = Vec::new();
    for (local, remote_path) in mounts {
        let local = match shellexpand::env(local) {
            Ok(expanded) => PathBuf::from(expanded.as_ref()),
            Err(err) => {
                error!(local = %local, %err, "cannot expand mount directory, skipping");
                continue;
            }
        };

        if remote_path.trim() == "/" {
            error!(
                local = %local.display(),
                "mounting the drive root is not supported, skipping"
            );
            continue;
        }

        let resolved = runtime.block_on(client.find_file(remote_path, Query::new().folders_only()));
        let root_id = match resolved {
            Ok(Some(id)) => id,
            Ok(None) => {
                warn!(remote = %remote_path, "remote directory not found, skipping");
                continue;
            }
            Err(err) => {
                warn!(remote = %remote_path, %err, "unable to resolve remote directory, skipping");
                continue;
            }
        };

        if let Err(err) = create_mount_dir(&local) {
            error!(local = %local.display(), %err, "cannot create mount directory, skipping");
            continue;
        }

        let core = FsCore::new(
            Arc::clone(&remote),
            Arc::clone(&entries),
            root_id,
            owner,
        );
        let adapter = DriveFuse::new(core, runtime.handle().clone());
        let options = [
            MountOption::FSName("godrive-fuse".to_owned()),
            MountOption::AutoUnmount,
            MountOption::DefaultPermissions,
        ];
        match fuser::spawn_mount2(adapter, &local, &options) {
            Ok(session) => {
                info!(remote = %remote_path, local = %local.display(), "mounted");
                sessions.push((local, session));
            }
            Err(err) => {
                error!(remote = %remote_path, local = %local.display(), %err, "unable to mount");
            }
        }
    }

    if sessions.is_empty() {
        warn!("nothing was mounted");
        return;
    }

    // On a shutdown signal, detach every mountpoint concurrently. The
    // session threads below observe the unmounts and drain.
    let mounted_paths: Vec<PathBuf> = sessions.iter().map(|(path, _)| path.clone()).collect();
    let _watcher = runtime.spawn(async move {
        if wait_for_shutdown().await.is_err() {
            error!("unable to install signal handlers");
            return;
        }
        for path in mounted_paths {
            let _ = tokio::task::spawn_blocking(move || force_unmount(&path));
        }
    });

    let waiters: Vec<_> = sessions
        .into_iter()
        .map(|(path, session)| {
            std::thread::spawn(move || {
                session.join();
                info!(local = %path.display(), "unmounted");
            })
        })
        .collect();
    for waiter in waiters {
        if waiter.join().is_err() {
            error!("mount waiter panicked");
        }
    }
}

/// Ensure the mount directory exists with mode 0755.
fn create_mount_dir(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::DirBuilderExt as _;
    match std::fs::DirBuilder::new().recursive(true).mode(0o755).create(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => Ok(()),
        Err(err) => Err(err),
    }
}

async fn wait_for_shutdown() -> std::io::Result<()> {
    use tokio::signal;
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;
    tokio::select! {
        _ = signal::ctrl_c() => info!("interrupt received, unmounting all"),
        _ = sigterm.recv() => info!("termination signal received, unmounting all"),
    }
    Ok(())
}

/// Lazily detach a mountpoint, retrying while the kernel reports it busy.
fn force_unmount(path: &Path) {
    const ATTEMPTS: usize = 10;
    const DELAY: Duration = Duration::from_millis(10);

    for attempt in 1..=ATTEMPTS {
        match nix::mount::umount2(path, nix::mount::MntFlags::MNT_DETACH) {
            Ok(()) => {
                debug!(path = %path.display(), attempt, "detached");
                return;
            }
            Err(Errno::EBUSY) => {
                debug!(path = %path.display(), attempt, "mountpoint busy, retrying");
                std::thread::sleep(DELAY);
            }
            Err(Errno::EINVAL | Errno::ENOENT) => {
                debug!(path = %path.display(), "already unmounted");
                return;
            }
            Err(err) => {
                error!(path = %path.display(), %err, "unable to unmount");
                return;
            }
        }
    }
    warn!(path = %path.display(), "mountpoint still busy after {ATTEMPTS} attempts");
}
