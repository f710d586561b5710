//! The API route table. Every handler is a plain async function of the
//! shared `App` and its bound arguments.

use crate::app::App;
use crate::concepts::{CompilationKey, CompilationKind, PostOptions};
use crate::core::{AppError, AppResult, DocId};
use crate::responses;
use crate::web::{BoundCall, ParamSpec, RegistryError, RouteRegistry};
use http::Method;
use serde_json::{Value, json};
use std::sync::Arc;

type State = Arc<App>;

pub fn build_registry() -> Result<RouteRegistry<State>, RegistryError> {
    let mut routes = RouteRegistry::new();
    register_users(&mut routes)?;
    register_posts(&mut routes)?;
    register_friends(&mut routes)?;
    register_groups(&mut routes)?;
    register_media(&mut routes)?;
    register_compilations(&mut routes)?;
    Ok(routes)
}

fn session_user(app: &App, call: &BoundCall) -> AppResult<DocId> {
    app.sessions.get_user(&call.session()?)
}

fn msg(text: &str) -> Value {
    json!({ "msg": text })
}

// ---- users & sessions ----

fn register_users(routes: &mut RouteRegistry<State>) -> Result<(), RegistryError> {
    routes
        .register(Method::GET, "/session", get_session_user, vec![ParamSpec::session()])?
        .register(Method::GET, "/users", get_users, vec![])?
        .register(
            Method::GET,
            "/users/:username",
            get_user,
            vec![ParamSpec::string("username")],
        )?
        .register(
            Method::POST,
            "/users",
            create_user,
            vec![
                ParamSpec::session(),
                ParamSpec::string("username"),
                ParamSpec::string("password"),
            ],
        )?
        .register(
            Method::PATCH,
            "/users",
            update_user,
            vec![
                ParamSpec::session(),
                ParamSpec::partial("update", &["username", "password"]),
            ],
        )?
        .register(Method::DELETE, "/users", delete_user, vec![ParamSpec::session()])?
        .register(
            Method::POST,
            "/login",
            log_in,
            vec![
                ParamSpec::session(),
                ParamSpec::string("username"),
                ParamSpec::string("password"),
            ],
        )?
        .register(Method::POST, "/logout", log_out, vec![ParamSpec::session()])?;
    Ok(())
}

async fn get_session_user(app: State, call: BoundCall) -> AppResult<Value> {
    let user = session_user(&app, &call)?;
    Ok(json!(app.users.get_user_by_id(user).await?))
}

async fn get_users(app: State, _call: BoundCall) -> AppResult<Value> {
    Ok(json!(app.users.get_users(None).await?))
}

async fn get_user(app: State, call: BoundCall) -> AppResult<Value> {
    let username = call.str("username")?;
    Ok(json!(app.users.get_user_by_username(&username).await?))
}

async fn create_user(app: State, call: BoundCall) -> AppResult<Value> {
    app.sessions.is_logged_out(&call.session()?)?;
    let user = app
        .users
        .create(&call.str("username")?, &call.str("password")?)
        .await?;
    Ok(json!({ "msg": "User created successfully!", "user": user }))
}

async fn update_user(app: State, call: BoundCall) -> AppResult<Value> {
    let user = session_user(&app, &call)?;
    let updated = app.users.update(user, call.object("update")?).await?;
    Ok(json!({ "msg": "Updated user successfully!", "user": updated }))
}

async fn delete_user(app: State, call: BoundCall) -> AppResult<Value> {
    let session = call.session()?;
    let user = app.sessions.get_user(&session)?;
    app.sessions.end(&session)?;
    app.users.delete(user).await?;
    Ok(msg("Deleted user!"))
}

async fn log_in(app: State, call: BoundCall) -> AppResult<Value> {
    let session = call.session()?;
    let user = app
        .users
        .authenticate(&call.str("username")?, &call.str("password")?)
        .await?;
    app.sessions.start(&session, user.id)?;
    Ok(msg("Logged in!"))
}

async fn log_out(app: State, call: BoundCall) -> AppResult<Value> {
    app.sessions.end(&call.session()?)?;
    Ok(msg("Logged out!"))
}

// ---- posts ----

fn register_posts(routes: &mut RouteRegistry<State>) -> Result<(), RegistryError> {
    routes
        .register(
            Method::GET,
            "/posts",
            get_posts,
            vec![ParamSpec::string("author").optional()],
        )?
        .register(
            Method::POST,
            "/posts",
            create_post,
            vec![
                ParamSpec::session(),
                ParamSpec::string("content"),
                ParamSpec::partial("options", &["backgroundColor"]).optional(),
            ],
        )?
        .register(
            Method::PATCH,
            "/posts/:id",
            update_post,
            vec![
                ParamSpec::session(),
                ParamSpec::id("id"),
                ParamSpec::partial("update", &["content", "options.backgroundColor"]),
            ],
        )?
        .register(
            Method::DELETE,
            "/posts/:id",
            delete_post,
            vec![ParamSpec::session(), ParamSpec::id("id")],
        )?;
    Ok(())
}

async fn get_posts(app: State, call: BoundCall) -> AppResult<Value> {
    let posts = match call.opt_str("author")? {
        Some(author) => {
            let author = app.users.get_user_by_username(&author).await?;
            app.posts.get_by_author(author.id).await?
        }
        None => app.posts.get_posts().await?,
    };
    responses::posts(&app.users, &posts).await
}

async fn create_post(app: State, call: BoundCall) -> AppResult<Value> {
    let user = session_user(&app, &call)?;
    let options = match call.opt_object("options")? {
        Some(raw) => Some(
            serde_json::from_value::<PostOptions>(Value::Object(raw))
                .map_err(|err| AppError::bad_request(format!("Invalid post options: {err}")))?,
        ),
        None => None,
    };
    let post = app.posts.create(user, &call.str("content")?, options).await?;
    app.votes.initialize_post_votes(post.id).await?;
    let shaped = responses::post(&app.users, &post).await?;
    Ok(json!({ "msg": "Post successfully created!", "post": shaped }))
}

async fn update_post(app: State, call: BoundCall) -> AppResult<Value> {
    let user = session_user(&app, &call)?;
    let id = call.id("id")?;
    app.posts.is_author(user, id).await?;
    let post = app.posts.update(id, call.object("update")?).await?;
    let shaped = responses::post(&app.users, &post).await?;
    Ok(json!({ "msg": "Successfully updated post!", "post": shaped }))
}

async fn delete_post(app: State, call: BoundCall) -> AppResult<Value> {
    let user = session_user(&app, &call)?;
    let id = call.id("id")?;
    app.posts.is_author(user, id).await?;
    app.posts.delete(id).await?;
    app.votes.delete_post_votes(id).await?;
    Ok(msg("Deleted post successfully!"))
}

// ---- friends ----

fn register_friends(routes: &mut RouteRegistry<State>) -> Result<(), RegistryError> {
    let with_name = |name| vec![ParamSpec::session(), ParamSpec::string(name)];
    routes
        .register(Method::GET, "/friends", get_friends, vec![ParamSpec::session()])?
        .register(
            Method::DELETE,
            "/friends/:friend",
            remove_friend,
            with_name("friend"),
        )?
        .register(
            Method::GET,
            "/friend/requests",
            get_requests,
            vec![ParamSpec::session()],
        )?
        .register(
            Method::POST,
            "/friend/requests/:to",
            send_friend_request,
            with_name("to"),
        )?
        .register(
            Method::DELETE,
            "/friend/requests/:to",
            remove_friend_request,
            with_name("to"),
        )?
        .register(
            Method::PUT,
            "/friend/accept/:from",
            accept_friend_request,
            with_name("from"),
        )?
        .register(
            Method::PUT,
            "/friend/reject/:from",
            reject_friend_request,
            with_name("from"),
        )?;
    Ok(())
}

/// Session user plus the id of the user named by parameter `param`.
async fn user_and_other(app: &App, call: &BoundCall, param: &str) -> AppResult<(DocId, DocId)> {
    let user = session_user(app, call)?;
    let other = app.users.get_user_by_username(&call.str(param)?).await?;
    Ok((user, other.id))
}

async fn get_friends(app: State, call: BoundCall) -> AppResult<Value> {
    let user = session_user(&app, &call)?;
    let friends = app.friends.get_friends(user).await?;
    Ok(json!(app.users.ids_to_usernames(&friends).await?))
}

async fn remove_friend(app: State, call: BoundCall) -> AppResult<Value> {
    let (user, friend) = user_and_other(&app, &call, "friend").await?;
    app.friends.remove_friend(user, friend).await?;
    Ok(msg("Unfriended!"))
}

async fn get_requests(app: State, call: BoundCall) -> AppResult<Value> {
    let user = session_user(&app, &call)?;
    let requests = app.friends.get_requests(user).await?;
    responses::friend_requests(&app.users, &requests).await
}

async fn send_friend_request(app: State, call: BoundCall) -> AppResult<Value> {
    let (user, to) = user_and_other(&app, &call, "to").await?;
    app.friends.send_request(user, to).await?;
    Ok(msg("Sent request!"))
}

async fn remove_friend_request(app: State, call: BoundCall) -> AppResult<Value> {
    let (user, to) = user_and_other(&app, &call, "to").await?;
    app.friends.remove_request(user, to).await?;
    Ok(msg("Removed request!"))
}

async fn accept_friend_request(app: State, call: BoundCall) -> AppResult<Value> {
    let (user, from) = user_and_other(&app, &call, "from").await?;
    app.friends.accept_request(from, user).await?;
    Ok(msg("Accepted request!"))
}

async fn reject_friend_request(app: State, call: BoundCall) -> AppResult<Value> {
    let (user, from) = user_and_other(&app, &call, "from").await?;
    app.friends.reject_request(from, user).await?;
    Ok(msg("Rejected request!"))
}

// ---- groups ----

fn register_groups(routes: &mut RouteRegistry<State>) -> Result<(), RegistryError> {
    routes
        .register(
            Method::POST,
            "/group",
            create_group,
            vec![ParamSpec::session(), ParamSpec::string("name")],
        )?
        .register(Method::GET, "/group", get_groups, vec![])?
        .register(
            Method::GET,
            "/group/:name",
            get_group,
            vec![ParamSpec::string("name")],
        )?
        .register(
            Method::PUT,
            "/group/join/:name",
            join_group,
            vec![ParamSpec::session(), ParamSpec::string("name")],
        )?
        .register(
            Method::PUT,
            "/group/leave/:name",
            leave_group,
            vec![ParamSpec::session(), ParamSpec::string("name")],
        )?;
    Ok(())
}

async fn create_group(app: State, call: BoundCall) -> AppResult<Value> {
    let group = app.groups.create(&call.str("name")?).await?;
    Ok(json!({ "msg": "Group created successfully!", "group": group.body.name }))
}

async fn get_groups(app: State, _call: BoundCall) -> AppResult<Value> {
    Ok(json!(app.groups.get_groups().await?))
}

async fn get_group(app: State, call: BoundCall) -> AppResult<Value> {
    Ok(json!(app.groups.get_group_by_name(&call.str("name")?).await?))
}

async fn join_group(app: State, call: BoundCall) -> AppResult<Value> {
    let user = session_user(&app, &call)?;
    let group = app.groups.register_member(user, &call.str("name")?).await?;
    Ok(json!({ "msg": "Joined group!", "group": group }))
}

async fn leave_group(app: State, call: BoundCall) -> AppResult<Value> {
    let user = session_user(&app, &call)?;
    app.groups.remove_member(user, &call.str("name")?).await?;
    Ok(msg("Left group!"))
}

// ---- captions, music, votes, banners ----

fn register_media(routes: &mut RouteRegistry<State>) -> Result<(), RegistryError> {
    let by_id = || vec![ParamSpec::id("_id")];
    let session_and_id = || vec![ParamSpec::session(), ParamSpec::id("_id")];
    routes
        .register(
            Method::POST,
            "/caption",
            create_caption,
            vec![
                ParamSpec::session(),
                ParamSpec::id("media"),
                ParamSpec::string("name"),
            ],
        )?
        .register(Method::GET, "/caption/:_id", get_caption, by_id())?
        .register(Method::GET, "/caption/media/:_id", get_media_captions, by_id())?
        .register(
            Method::POST,
            "/music",
            add_music,
            vec![
                ParamSpec::session(),
                ParamSpec::string("audioLink"),
                ParamSpec::string("artist"),
                ParamSpec::string("name"),
                ParamSpec::int("duration"),
            ],
        )?
        .register(Method::GET, "/music", get_all_music, vec![])?
        .register(Method::GET, "/music/id/:_id", get_music_by_id, by_id())?
        .register(
            Method::GET,
            "/music/artist/:artist",
            get_music_by_artist,
            vec![ParamSpec::string("artist")],
        )?
        .register(
            Method::GET,
            "/music/name/:name",
            get_music_by_name,
            vec![ParamSpec::string("name")],
        )?
        .register(Method::PUT, "/vote/upvote/:_id", upvote_post, session_and_id())?
        .register(Method::PUT, "/vote/downvote/:_id", downvote_post, session_and_id())?
        .register(Method::GET, "/vote/rating/:_id", get_post_rating, by_id())?
        .register(
            Method::POST,
            "/photobanner/:_id",
            set_photo_banner,
            vec![
                ParamSpec::session(),
                ParamSpec::id("_id"),
                ParamSpec::string("photoLink"),
            ],
        )?
        .register(Method::GET, "/photobanner/:_id", get_photo_banner, by_id())?;
    Ok(())
}

async fn create_caption(app: State, call: BoundCall) -> AppResult<Value> {
    session_user(&app, &call)?;
    let caption = app
        .captions
        .create(call.id("media")?, &call.str("name")?)
        .await?;
    Ok(json!({ "msg": "Caption created successfully!", "caption": caption }))
}

async fn get_caption(app: State, call: BoundCall) -> AppResult<Value> {
    Ok(json!(app.captions.get_caption_by_id(call.id("_id")?).await?))
}

async fn get_media_captions(app: State, call: BoundCall) -> AppResult<Value> {
    Ok(json!(app.captions.get_captions_by_media(call.id("_id")?).await?))
}

async fn add_music(app: State, call: BoundCall) -> AppResult<Value> {
    session_user(&app, &call)?;
    let music = app
        .music
        .add(
            &call.str("audioLink")?,
            &call.str("artist")?,
            &call.str("name")?,
            call.int("duration")?,
        )
        .await?;
    Ok(json!({ "msg": "Music added successfully!", "music": music }))
}

async fn get_all_music(app: State, _call: BoundCall) -> AppResult<Value> {
    Ok(json!(app.music.get_all().await?))
}

async fn get_music_by_id(app: State, call: BoundCall) -> AppResult<Value> {
    Ok(json!(app.music.get_by_id(call.id("_id")?).await?))
}

async fn get_music_by_artist(app: State, call: BoundCall) -> AppResult<Value> {
    Ok(json!(app.music.get_by_artist(&call.str("artist")?).await?))
}

async fn get_music_by_name(app: State, call: BoundCall) -> AppResult<Value> {
    Ok(json!(app.music.get_by_name(&call.str("name")?).await?))
}

async fn upvote_post(app: State, call: BoundCall) -> AppResult<Value> {
    session_user(&app, &call)?;
    let tally = app.votes.upvote_post(call.id("_id")?).await?;
    Ok(json!({ "msg": "Post successfully updated!", "voteCount": tally.body.vote_count }))
}

async fn downvote_post(app: State, call: BoundCall) -> AppResult<Value> {
    session_user(&app, &call)?;
    let tally = app.votes.downvote_post(call.id("_id")?).await?;
    Ok(json!({ "msg": "Post successfully updated!", "voteCount": tally.body.vote_count }))
}

async fn get_post_rating(app: State, call: BoundCall) -> AppResult<Value> {
    Ok(json!(app.votes.get_post_rating(call.id("_id")?).await?))
}

async fn set_photo_banner(app: State, call: BoundCall) -> AppResult<Value> {
    session_user(&app, &call)?;
    let banner = app
        .banners
        .set_photo(call.id("_id")?, &call.str("photoLink")?)
        .await?;
    Ok(json!({ "msg": "Photobanner set successfully!", "banner": banner }))
}

async fn get_photo_banner(app: State, call: BoundCall) -> AppResult<Value> {
    Ok(json!(app.banners.get_item_photo_banner(call.id("_id")?).await?))
}

// ---- compilations ----

fn register_compilations(routes: &mut RouteRegistry<State>) -> Result<(), RegistryError> {
    let content = |owner: &'static str| {
        vec![
            ParamSpec::session(),
            ParamSpec::string(owner),
            ParamSpec::id("content"),
        ]
    };
    let reorder = |owner: &'static str| {
        vec![
            ParamSpec::session(),
            ParamSpec::string(owner),
            ParamSpec::id("content"),
            ParamSpec::int("position"),
        ]
    };
    let named = |owner: &'static str| vec![ParamSpec::session(), ParamSpec::string(owner)];

    routes
        .register(
            Method::POST,
            "/compilation/personal",
            create_personal,
            named("name"),
        )?
        .register(
            Method::POST,
            "/compilation/personal/delete/:_id",
            delete_personal,
            vec![ParamSpec::session(), ParamSpec::id("_id")],
        )?
        .register(
            Method::PUT,
            "/compilation/personal/add",
            add_personal,
            content("name"),
        )?
        .register(
            Method::PUT,
            "/compilation/personal/remove",
            remove_personal,
            content("name"),
        )?
        .register(
            Method::PUT,
            "/compilation/personal/reorder",
            reorder_personal,
            reorder("name"),
        )?
        .register(
            Method::GET,
            "/compilation/personal/:name",
            get_personal,
            named("name"),
        )?;

    for kind in [CompilationKind::Headline, CompilationKind::Recents] {
        let base = match kind {
            CompilationKind::Headline => "/compilation/headline",
            _ => "/compilation/recents",
        };
        routes
            .register(
                Method::POST,
                base,
                move |app: State, call: BoundCall| create_group_compilation(app, call, kind),
                named("group"),
            )?
            .register(
                Method::PUT,
                &format!("{base}/add"),
                move |app: State, call: BoundCall| add_group_item(app, call, kind),
                content("group"),
            )?
            .register(
                Method::PUT,
                &format!("{base}/remove"),
                move |app: State, call: BoundCall| remove_group_item(app, call, kind),
                content("group"),
            )?
            .register(
                Method::PUT,
                &format!("{base}/reorder"),
                move |app: State, call: BoundCall| reorder_group(app, call, kind),
                reorder("group"),
            )?
            .register(
                Method::GET,
                &format!("{base}/:group"),
                move |app: State, call: BoundCall| get_group_compilation(app, call, kind),
                vec![ParamSpec::string("group")],
            )?;
    }

    routes.register(
        Method::POST,
        "/compilation/headline/delete",
        delete_headline,
        named("group"),
    )?;
    Ok(())
}

async fn create_personal(app: State, call: BoundCall) -> AppResult<Value> {
    let user = session_user(&app, &call)?;
    let name = call.str("name")?;
    let created = app
        .compilations
        .create(personal_key(user, &name))
        .await?;
    Ok(json!({ "msg": "Compilation created successfully!", "compilation": created }))
}

async fn delete_personal(app: State, call: BoundCall) -> AppResult<Value> {
    let user = session_user(&app, &call)?;
    app.compilations.delete_by_id(call.id("_id")?, user).await?;
    Ok(msg("Compilation deleted successfully!"))
}

async fn add_personal(app: State, call: BoundCall) -> AppResult<Value> {
    let user = session_user(&app, &call)?;
    let name = call.str("name")?;
    let updated = app
        .compilations
        .add_item(personal_key(user, &name), call.id("content")?)
        .await?;
    Ok(json!({ "msg": "Added to compilation!", "compilation": updated }))
}

async fn remove_personal(app: State, call: BoundCall) -> AppResult<Value> {
    let user = session_user(&app, &call)?;
    let name = call.str("name")?;
    let updated = app
        .compilations
        .remove_item(personal_key(user, &name), call.id("content")?)
        .await?;
    Ok(json!({ "msg": "Removed from compilation!", "compilation": updated }))
}

async fn reorder_personal(app: State, call: BoundCall) -> AppResult<Value> {
    let user = session_user(&app, &call)?;
    let name = call.str("name")?;
    let updated = app
        .compilations
        .reorder(
            personal_key(user, &name),
            call.id("content")?,
            call.int("position")?,
        )
        .await?;
    Ok(json!({ "msg": "Compilation reordered!", "compilation": updated }))
}

async fn get_personal(app: State, call: BoundCall) -> AppResult<Value> {
    let user = session_user(&app, &call)?;
    let name = call.str("name")?;
    Ok(json!(app.compilations.get(personal_key(user, &name)).await?))
}

fn personal_key(owner: DocId, name: &str) -> CompilationKey<'_> {
    CompilationKey {
        owner,
        kind: CompilationKind::Personal,
        name,
    }
}

/// Resolves the `group` parameter to (group id, group name), requiring the
/// session user to be a member.
async fn member_group(app: &App, call: &BoundCall) -> AppResult<(DocId, String)> {
    let user = session_user(app, call)?;
    let group = app.groups.ensure_member(user, &call.str("group")?).await?;
    Ok((group.id, group.body.name))
}

fn group_key(owner: DocId, kind: CompilationKind, name: &str) -> CompilationKey<'_> {
    CompilationKey { owner, kind, name }
}

async fn create_group_compilation(app: State, call: BoundCall, kind: CompilationKind) -> AppResult<Value> {
    let (group, name) = member_group(&app, &call).await?;
    let created = app.compilations.create(group_key(group, kind, &name)).await?;
    Ok(json!({ "msg": "Compilation created successfully!", "compilation": created }))
}

async fn add_group_item(app: State, call: BoundCall, kind: CompilationKind) -> AppResult<Value> {
    let (group, name) = member_group(&app, &call).await?;
    let updated = app
        .compilations
        .add_item(group_key(group, kind, &name), call.id("content")?)
        .await?;
    Ok(json!({ "msg": "Added to compilation!", "compilation": updated }))
}

async fn remove_group_item(app: State, call: BoundCall, kind: CompilationKind) -> AppResult<Value> {
    let (group, name) = member_group(&app, &call).await?;
    let updated = app
        .compilations
        .remove_item(group_key(group, kind, &name), call.id("content")?)
        .await?;
    Ok(json!({ "msg": "Removed from compilation!", "compilation": updated }))
}

async fn reorder_group(app: State, call: BoundCall, kind: CompilationKind) -> AppResult<Value> {
    let (group, name) = member_group(&app, &call).await?;
    let updated = app
        .compilations
        .reorder(
            group_key(group, kind, &name),
            call.id("content")?,
            call.int("position")?,
        )
        .await?;
    Ok(json!({ "msg": "Compilation reordered!", "compilation": updated }))
}

async fn get_group_compilation(app: State, call: BoundCall, kind: CompilationKind) -> AppResult<Value> {
    let group = app.groups.get_group_by_name(&call.str("group")?).await?;
    let found = app
        .compilations
        .get(group_key(group.id, kind, &group.body.name))
        .await?;
    Ok(json!(found))
}

async fn delete_headline(app: State, call: BoundCall) -> AppResult<Value> {
    let (group, name) = member_group(&app, &call).await?;
    app.compilations
        .delete(group_key(group, CompilationKind::Headline, &name))
        .await?;
    Ok(msg("Compilation deleted successfully!"))
}
