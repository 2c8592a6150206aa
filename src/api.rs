use rocket::FromForm;
use rocket::State;
use rocket::form::Form;
use rocket::fs::TempFile;
use rocket::http::Status;
use rocket::response::Redirect;
use rocket::response::status::Custom;
use rocket::response::{self, Responder, Response};
use rocket::serde::{Deserialize, Serialize, json::Json};
use sqlx::{Pool, Sqlite};
use validator::Validate;

use crate::auth::UserSession;
use crate::auth::{Permission, Role, User};
use crate::db::create_player;
use crate::db::create_test;
use crate::db::create_user;
use crate::db::delete_player;
use crate::db::delete_test;
use crate::db::find_user_by_email;
use crate::db::get_all_sessions;
use crate::db::get_player;
use crate::db::get_test;
use crate::db::update_player;
use crate::db::update_test;
use crate::db::{
    authenticate_user, create_user_session, get_all_players, get_all_tests, invalidate_session,
};
use crate::error::AppError;
use crate::models::{BetterScore, FitnessTest, Player, TestSession};
use crate::provision::provision_player_accounts;
use crate::reconcile::{ImportReport, import_score_sheet};
use crate::sheet::{CsvFile, render_credentials_sheet, render_template_sheet};
use crate::stats::{
    Leaderboard, ResultsSort, SessionBreakdown, SortOrder, player_session_breakdown,
    session_leaderboard,
};
use crate::validation::AppErrorExt;
use crate::validation::JsonValidateExt;
use crate::validation::PermissionCheckExt;
use crate::validation::ValidationResponse;

#[derive(Deserialize, Validate)]
pub struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Deserialize, Validate)]
pub struct RegistrationRequest {
    #[validate(email(message = "A valid email address is required"))]
    email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    password: String,
    role: String,
}

#[derive(Deserialize, Validate)]
pub struct PlayerRequest {
    #[validate(length(min = 1, message = "First name is required"))]
    first_name: String,
    #[validate(length(min = 1, message = "Last name is required"))]
    last_name: String,
    age: Option<i64>,
}

#[derive(Deserialize, Validate)]
pub struct TestRequest {
    #[validate(length(min = 1, message = "Test name is required"))]
    name: String,
    description: Option<String>,
    unit: Option<String>,
    better_score: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct LoginResponse {
    pub success: bool,
    pub user: Option<UserData>,
    pub error: Option<String>,
    pub redirect_url: Option<String>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct UserData {
    pub id: i64,
    pub email: String,
    pub role: String,
    pub player_id: Option<i64>,
}

impl From<User> for UserData {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            role: user.role.to_string(),
            player_id: user.player_id,
        }
    }
}

#[post("/login", data = "<login>")]
pub async fn api_login(
    login: Json<LoginRequest>,
    cookies: &rocket::http::CookieJar<'_>,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<LoginResponse>, Custom<Json<ValidationResponse>>> {
    use chrono::Utc;
    use rocket::http::{Cookie, SameSite};

    let validated = login.validate_custom()?;

    let user = authenticate_user(db, &validated.email, &validated.password)
        .await
        .validate_custom()?;

    match user {
        Some(user) => {
            let token = UserSession::generate_token();
            let expires_at = Utc::now().naive_utc() + chrono::Duration::hours(1);

            create_user_session(db, user.id, &token, expires_at)
                .await
                .validate_custom()?;

            cookies.add_private(
                Cookie::build(("session_token", token))
                    .same_site(SameSite::Lax)
                    .max_age(rocket::time::Duration::hours(1)),
            );
            cookies.add_private(
                Cookie::build(("user_id", user.id.to_string()))
                    .same_site(SameSite::Lax)
                    .max_age(rocket::time::Duration::hours(1)),
            );
            cookies.add_private(
                Cookie::build(("logged_in", user.email.clone()))
                    .same_site(SameSite::Lax)
                    .max_age(rocket::time::Duration::hours(1)),
            );
            cookies.add_private(
                Cookie::build((
                    "session_timestamp",
                    rocket::time::OffsetDateTime::now_utc()
                        .unix_timestamp()
                        .to_string(),
                ))
                .same_site(SameSite::Lax)
                .max_age(rocket::time::Duration::hours(1)),
            );
            cookies.add_private(
                Cookie::build(("user_role", user.role.to_string()))
                    .same_site(SameSite::Lax)
                    .max_age(rocket::time::Duration::hours(1)),
            );

            let redirect_url = match (&user.role, user.player_id) {
                (Role::Player, Some(player_id)) => format!("/ui/player/{}", player_id),
                _ => "/ui/dashboard".to_string(),
            };

            Ok(Json(LoginResponse {
                success: true,
                user: Some(user.into()),
                error: None,
                redirect_url: Some(redirect_url),
            }))
        }
        None => Ok(Json(LoginResponse {
            success: false,
            user: None,
            error: Some("Invalid email or password".to_string()),
            redirect_url: None,
        })),
    }
}

#[get("/me")]
pub async fn api_me(user: User) -> Json<UserData> {
    Json(user.into())
}

// Fallback when the auth guard fails so /me reports a clean 401
#[get("/me", rank = 2)]
pub async fn api_me_unauthorized() -> Status {
    Status::Unauthorized
}

#[post("/logout")]
pub async fn api_logout(
    cookies: &rocket::http::CookieJar<'_>,
    db: &State<Pool<Sqlite>>,
) -> Redirect {
    if let Some(cookie) = cookies.get_private("session_token") {
        let token = cookie.value().to_string();
        let _ = invalidate_session(db, &token).await;
    }

    cookies.remove_private("session_token");
    cookies.remove_private("user_id");
    cookies.remove_private("logged_in");
    cookies.remove_private("session_timestamp");
    cookies.remove_private("user_role");

    Redirect::to("/ui/")
}

#[post("/register", data = "<registration>")]
pub async fn api_register(
    registration: Json<RegistrationRequest>,
    db: &State<Pool<Sqlite>>,
) -> Result<Status, Custom<Json<ValidationResponse>>> {
    let validated = registration.validate_custom()?;

    Role::from_str(&validated.role)
        .map_err(|_| AppError::Validation(format!("Unknown role: {}", validated.role)))
        .validate_custom()?;

    let existing_user = find_user_by_email(db, &validated.email)
        .await
        .validate_custom()?;

    if existing_user.is_some() {
        return Err(Custom(
            Status::Conflict,
            Json(ValidationResponse::with_error(
                "email",
                "An account with this email already exists",
            )),
        ));
    }

    create_user(db, &validated.email, &validated.password, &validated.role)
        .await
        .validate_custom()?;

    Ok(Status::Created)
}

#[get("/players")]
pub async fn api_get_players(
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<Player>>, Status> {
    user.require_permission(Permission::ViewAllPlayers)?;

    let players = get_all_players(db).await?;

    Ok(Json(players))
}

#[post("/players", data = "<player>")]
pub async fn api_create_player(
    player: Json<PlayerRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Status, Custom<Json<ValidationResponse>>> {
    user.require_permission(Permission::ManagePlayers)
        .validate_custom()?;

    let validated = player.validate_custom()?;

    create_player(db, &validated.first_name, &validated.last_name, validated.age)
        .await
        .validate_custom()?;

    Ok(Status::Created)
}

#[put("/players/<id>", data = "<player>")]
pub async fn api_update_player(
    id: i64,
    player: Json<PlayerRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Status, Custom<Json<ValidationResponse>>> {
    user.require_permission(Permission::ManagePlayers)
        .validate_custom()?;

    let validated = player.validate_custom()?;

    get_player(db, id).await.validate_custom()?;

    update_player(db, id, &validated.first_name, &validated.last_name, validated.age)
        .await
        .validate_custom()?;

    Ok(Status::Ok)
}

#[delete("/players/<id>")]
pub async fn api_delete_player(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Status, Status> {
    user.require_permission(Permission::ManagePlayers)?;

    delete_player(db, id).await?;

    Ok(Status::Ok)
}

#[derive(Serialize, Debug)]
pub struct PlayerProfileResponse {
    pub player: Player,
    pub sessions: Vec<SessionBreakdown>,
}

#[get("/players/<id>")]
pub async fn api_get_player_profile(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<PlayerProfileResponse>, Status> {
    if user.player_id != Some(id) && !user.has_permission(Permission::ViewAllPlayers) {
        tracing::warn!(
            user_id = user.id,
            player_id = id,
            "User tried to view another player's profile"
        );
        return Err(Status::Forbidden);
    }

    let player = get_player(db, id).await?;
    let sessions = player_session_breakdown(db, id).await?;

    Ok(Json(PlayerProfileResponse { player, sessions }))
}

#[get("/tests")]
pub async fn api_get_tests(
    _user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<FitnessTest>>, Status> {
    let tests = get_all_tests(db).await?;

    Ok(Json(tests))
}

#[post("/tests", data = "<test>")]
pub async fn api_create_test(
    test: Json<TestRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Status, Custom<Json<ValidationResponse>>> {
    user.require_permission(Permission::ManageTests)
        .validate_custom()?;

    let validated = test.validate_custom()?;

    let better_score = BetterScore::from_str(&validated.better_score)
        .map_err(|_| AppError::Validation("better_score must be 'high' or 'low'".to_string()))
        .validate_custom()?;

    create_test(
        db,
        &validated.name,
        validated.description.as_deref().unwrap_or(""),
        validated.unit.as_deref().unwrap_or(""),
        better_score.as_str(),
    )
    .await
    .validate_custom()?;

    Ok(Status::Created)
}

#[put("/tests/<id>", data = "<test>")]
pub async fn api_update_test(
    id: i64,
    test: Json<TestRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Status, Custom<Json<ValidationResponse>>> {
    user.require_permission(Permission::ManageTests)
        .validate_custom()?;

    let validated = test.validate_custom()?;

    let better_score = BetterScore::from_str(&validated.better_score)
        .map_err(|_| AppError::Validation("better_score must be 'high' or 'low'".to_string()))
        .validate_custom()?;

    get_test(db, id).await.validate_custom()?;

    update_test(
        db,
        id,
        &validated.name,
        validated.description.as_deref().unwrap_or(""),
        validated.unit.as_deref().unwrap_or(""),
        better_score.as_str(),
    )
    .await
    .validate_custom()?;

    Ok(Status::Ok)
}

#[delete("/tests/<id>")]
pub async fn api_delete_test(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Status, Status> {
    user.require_permission(Permission::ManageTests)?;

    delete_test(db, id).await?;

    Ok(Status::Ok)
}

#[get("/sessions")]
pub async fn api_get_sessions(
    _user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<TestSession>>, Status> {
    let sessions = get_all_sessions(db).await?;

    Ok(Json(sessions))
}

#[derive(FromForm)]
pub struct ResultsQueryParams {
    session_id: Option<i64>,
    test_id: Option<i64>,
    sort_by: Option<String>,
    order: Option<String>,
}

#[get("/results?<params..>")]
pub async fn api_get_results(
    params: ResultsQueryParams,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Leaderboard>, Custom<Json<ValidationResponse>>> {
    user.require_permission(Permission::ViewResults)
        .validate_custom()?;

    let Some(session_id) = params.session_id else {
        return Err(Custom(
            Status::UnprocessableEntity,
            Json(ValidationResponse::with_error(
                "session_id",
                "Select a testing session",
            )),
        ));
    };

    let Some(test_id) = params.test_id else {
        return Err(Custom(
            Status::UnprocessableEntity,
            Json(ValidationResponse::with_error("test_id", "Select a test")),
        ));
    };

    let sort_by = ResultsSort::parse(params.sort_by.as_deref().unwrap_or(""));
    let order = SortOrder::parse(params.order.as_deref().unwrap_or(""));

    let leaderboard = session_leaderboard(db, session_id, test_id, sort_by, order)
        .await
        .validate_custom()?;

    Ok(Json(leaderboard))
}

#[get("/template")]
pub async fn api_download_template(
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<CsvFile, Status> {
    user.require_permission(Permission::ImportScores)?;

    let players = get_all_players(db).await?;
    let tests = get_all_tests(db).await?;

    Ok(CsvFile {
        filename: "fitness_template.csv",
        content: render_template_sheet(&players, &tests),
    })
}

#[derive(FromForm)]
pub struct UploadForm<'f> {
    month: Option<String>,
    year: Option<String>,
    file: Option<TempFile<'f>>,
}

#[post("/upload", data = "<form>")]
pub async fn api_upload_scores(
    mut form: Form<UploadForm<'_>>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<ImportReport>, Custom<Json<ValidationResponse>>> {
    user.require_permission(Permission::ImportScores)
        .validate_custom()?;

    let month = match form.month.as_deref().map(str::trim) {
        Some(month) if !month.is_empty() => month.to_string(),
        _ => {
            return Err(Custom(
                Status::UnprocessableEntity,
                Json(ValidationResponse::with_error(
                    "month",
                    "Please enter a testing month and year",
                )),
            ));
        }
    };

    let year = match form.year.as_deref().map(str::trim) {
        Some(year) if !year.is_empty() => match year.parse::<i64>() {
            Ok(year) => year,
            Err(_) => {
                return Err(Custom(
                    Status::UnprocessableEntity,
                    Json(ValidationResponse::with_error(
                        "year",
                        "Year must be a number",
                    )),
                ));
            }
        },
        _ => {
            return Err(Custom(
                Status::UnprocessableEntity,
                Json(ValidationResponse::with_error(
                    "year",
                    "Please enter a testing month and year",
                )),
            ));
        }
    };

    let Some(file) = form.file.as_mut() else {
        return Err(Custom(
            Status::UnprocessableEntity,
            Json(ValidationResponse::with_error("file", "No file selected")),
        ));
    };

    let upload_dir = std::env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".to_string());
    std::fs::create_dir_all(&upload_dir)
        .map_err(AppError::from)
        .validate_custom()?;

    let stored_path =
        std::path::Path::new(&upload_dir).join(format!("{}.csv", uuid::Uuid::new_v4()));
    file.copy_to(&stored_path)
        .await
        .map_err(AppError::from)
        .validate_custom()?;

    let text = rocket::tokio::fs::read_to_string(&stored_path)
        .await
        .map_err(AppError::from)
        .validate_custom()?;

    let report = import_score_sheet(db, &month, year, &text)
        .await
        .validate_custom()?;

    Ok(Json(report))
}

pub enum ProvisionResponse {
    Csv(CsvFile),
    Empty,
}

impl<'r> Responder<'r, 'static> for ProvisionResponse {
    fn respond_to(self, req: &'r rocket::Request<'_>) -> response::Result<'static> {
        match self {
            ProvisionResponse::Csv(file) => file.respond_to(req),
            ProvisionResponse::Empty => Response::build().status(Status::NoContent).ok(),
        }
    }
}

#[post("/provision")]
pub async fn api_provision_accounts(
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<ProvisionResponse, Custom<Json<ValidationResponse>>> {
    user.require_all_permissions(&[Permission::ProvisionAccounts, Permission::ManagePlayers])
        .validate_custom()?;

    let accounts = provision_player_accounts(db).await.validate_custom()?;

    if accounts.is_empty() {
        return Ok(ProvisionResponse::Empty);
    }

    Ok(ProvisionResponse::Csv(CsvFile {
        filename: "player_accounts.csv",
        content: render_credentials_sheet(&accounts),
    }))
}

#[get("/health")]
pub async fn health() -> &'static str {
    "OK"
}
