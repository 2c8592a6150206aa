use rand::distr::{Alphanumeric, SampleString};
use regex::Regex;
use serde::Serialize;
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::auth::Role;
use crate::db::{
    create_user, find_user_by_email, get_players_without_accounts, link_player_account,
};
use crate::error::AppError;
use crate::models::Player;

const TEMP_PASSWORD_LEN: usize = 12;

#[derive(Debug, Serialize, Clone)]
pub struct ProvisionedAccount {
    pub player_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub temp_password: String,
}

/// Login handle from the player's name: lowercased, dot-joined, anything
/// outside [a-z0-9] stripped.
pub fn derive_username(player: &Player) -> String {
    let cleanup = Regex::new(r"[^a-z0-9]+").unwrap();
    let first = cleanup
        .replace_all(&player.first_name.to_lowercase(), "")
        .into_owned();
    let last = cleanup
        .replace_all(&player.last_name.to_lowercase(), "")
        .into_owned();

    match (first.is_empty(), last.is_empty()) {
        (false, false) => format!("{}.{}", first, last),
        (false, true) => first,
        (true, false) => last,
        (true, true) => format!("player{}", player.id),
    }
}

fn generate_temp_password() -> String {
    Alphanumeric.sample_string(&mut rand::rng(), TEMP_PASSWORD_LEN)
}

/// Creates a login for every player without one. Returns the plaintext temp
/// passwords for the one-time credential export; only hashes are stored.
#[instrument(skip(pool))]
pub async fn provision_player_accounts(
    pool: &Pool<Sqlite>,
) -> Result<Vec<ProvisionedAccount>, AppError> {
    let players = get_players_without_accounts(pool).await?;

    let mut provisioned = Vec::new();
    for player in players {
        let mut username = derive_username(&player);
        if find_user_by_email(pool, &username).await?.is_some() {
            // Same-named players get a distinct handle
            username = format!("{}.{}", username, player.id);
        }

        let temp_password = generate_temp_password();
        let user_id = create_user(pool, &username, &temp_password, Role::Player.as_str()).await?;
        link_player_account(pool, player.id, user_id).await?;

        provisioned.push(ProvisionedAccount {
            player_id: player.id,
            first_name: player.first_name,
            last_name: player.last_name,
            username,
            temp_password,
        });
    }

    info!(count = provisioned.len(), "Provisioned player accounts");

    Ok(provisioned)
}
