use anyhow::Result;
use chrono::{DateTime, TimeDelta, Utc};
use forcefield::{
    config::Settings,
    polarity::Mode,
    rewrite::{Installation, Outcome},
    rules,
    store::{
        Clock, DiskFiles, Host, JsonFileStore, KeyValueStore, ManualClock, StoreScheduler, Task,
    },
    ForceField,
};
use rand::{rngs::StdRng, SeedableRng};
use std::{fs, path::Path, sync::Arc};

const WORDPRESS: &str = "# BEGIN WordPress
<IfModule mod_rewrite.c>
RewriteEngine On
RewriteRule . /index.php [L]
</IfModule>
# END WordPress";

fn host(settings: &Settings, clock: &Arc<ManualClock>, seed: u64) -> Result<Host> {
    let store: Arc<dyn KeyValueStore> = Arc::new(JsonFileStore::open(&settings.state_file)?);
    let clock: Arc<dyn Clock> = clock.clone();

    Ok(Host {
        scheduler: Arc::new(StoreScheduler::new(store.clone(), clock.clone())),
        store,
        files: Arc::new(DiskFiles),
        clock,
        rng: Box::new(StdRng::seed_from_u64(seed)),
    })
}

fn read(path: &Path) -> Result<String> {
    Ok(fs::read_to_string(path)?)
}

#[test]
fn full_lifecycle_on_disk() -> Result<()> {
    let root = tempfile::tempdir()?;
    let settings = Settings::new(root.path());
    fs::write(&settings.rules_file, WORDPRESS)?;

    let clock = Arc::new(ManualClock::new(DateTime::<Utc>::UNIX_EPOCH));
    let shield = ForceField::new(settings.clone(), host(&settings, &clock, 1)?);

    assert_eq!(shield.activate()?, Outcome::Written);
    let installed = read(&settings.rules_file)?;
    assert!(installed.starts_with("\n# BEGIN FORCEFIELD\n"));
    assert!(installed.contains(&rules::route_rule("safe-entrance.php")));
    assert!(installed.ends_with(WORDPRESS));

    for _ in 0..45 {
        shield.on_login_error("incorrect_password");
    }
    clock.advance(TimeDelta::seconds(60));
    assert_eq!(shield.run_due()?, vec![Task::CheckHits]);

    let secret = shield.status().polarity.active_secret_path;
    assert_ne!(secret, "safe-entrance.php");
    assert!(read(&settings.rules_file)?.contains(&rules::route_rule(&secret)));

    // a fresh instance over the same files sees the persisted state
    drop(shield);
    let shield = ForceField::new(settings.clone(), host(&settings, &clock, 2)?);
    let status = shield.status();
    assert_eq!(status.polarity.mode, Mode::Reversed);
    assert_eq!(status.polarity.active_secret_path, secret);
    assert_eq!(
        status.polarity.reversion_due,
        Some(DateTime::<Utc>::UNIX_EPOCH + TimeDelta::seconds(60 + 18_000))
    );
    assert_eq!(shield.on_request()?, Outcome::Unchanged);

    clock.advance(TimeDelta::seconds(18_000));
    assert_eq!(shield.run_due()?, vec![Task::StabilizePolarity]);
    assert!(read(&settings.rules_file)?.contains(&rules::route_rule("safe-entrance.php")));

    assert_eq!(shield.deactivate()?, Outcome::Written);
    assert_eq!(shield.status().installation, Installation::Absent);
    assert_eq!(read(&settings.rules_file)?, format!("\n{WORDPRESS}"));

    Ok(())
}

#[test]
fn unwritable_rules_are_reported() -> Result<()> {
    let root = tempfile::tempdir()?;
    let mut settings = Settings::new(root.path());
    settings.rules_file = root.path().join("missing-dir").join(".htaccess");

    let clock = Arc::new(ManualClock::new(DateTime::<Utc>::UNIX_EPOCH));
    let shield = ForceField::new(settings.clone(), host(&settings, &clock, 1)?);

    assert!(shield.activate().is_err());

    let diagnostics = shield.diagnostics();
    assert_eq!(diagnostics.len(), 1);
    let section = diagnostics[0].section.clone().unwrap_or_default();
    assert_eq!(section.first().map(String::as_str), Some("# BEGIN FORCEFIELD"));
    assert_eq!(section.last().map(String::as_str), Some(""));

    Ok(())
}
