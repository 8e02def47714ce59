use crate::commands::CommandResult;
use tenderdeck_core::config::{AppConfig, LoadOptions};
use tenderdeck_db::{
    connect_with_settings, migrations, seed_demo_users, verify_demo_users, SqlUserStore,
};

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "seed",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "seed",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;

        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        let store = SqlUserStore::new(pool.clone());
        let seeded = seed_demo_users(&store)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;

        let verified = verify_demo_users(&store)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;

        pool.close().await;

        if !verified {
            return Err((
                "seed_verification",
                "seeded accounts did not verify after write".to_string(),
                6u8,
            ));
        }
        Ok(seeded.users_seeded)
    });

    match result {
        Ok(count) => CommandResult::success("seed", format!("seeded {count} demo accounts")),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}
