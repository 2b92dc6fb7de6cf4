use std::convert::Infallible;

use serde::{Deserialize, Serialize};
use serde_json::json;
use warp::{
    filters::body::BodyDeserializeError,
    http::{header::CONTENT_DISPOSITION, StatusCode},
    reject::{InvalidQuery, MethodNotAllowed},
    reply::Response,
    Filter, Rejection, Reply,
};

use crate::{
    actions,
    constants::SHOPPING_LIST_FILENAME,
    error::FoodgramError,
    filter::RecipeFilter,
    form::{Form, FormData},
    jwt::SessionData,
    middleware::{with_possible_session, with_session, Unauthorized},
    permissions::ActionType,
    schema::{Entity, NewIngredient, NewTag, RecipePayload, Uuid},
    state::State,
};

#[derive(Debug, Default, Deserialize)]
struct IngredientQuery {
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SubscriptionQuery {
    recipes_limit: Option<i64>,
}

fn with_state(state: State) -> impl Filter<Extract = (State,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

fn reply<T: Serialize>(result: Result<T, FoodgramError>, status: StatusCode) -> Response {
    match result {
        Ok(value) => warp::reply::with_status(warp::reply::json(&value), status).into_response(),
        Err(e) => error_reply(e),
    }
}

fn empty_reply(result: Result<(), FoodgramError>) -> Response {
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_reply(e),
    }
}

fn error_reply(error: FoodgramError) -> Response {
    if matches!(
        error,
        FoodgramError::Query(_) | FoodgramError::Cache(_) | FoodgramError::Config(_)
    ) {
        log::error!("{error}");
    }

    let error: potion::Error = error.into();
    let status =
        StatusCode::from_u16(error.code as u16).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    warp::reply::with_status(warp::reply::json(&json!({ "errors": error.info })), status)
        .into_response()
}

fn shopping_list_reply(result: Result<String, FoodgramError>) -> Response {
    match result {
        Ok(text) => warp::reply::with_header(
            text,
            CONTENT_DISPOSITION,
            format!("attachment; filename=\"{SHOPPING_LIST_FILENAME}\""),
        )
        .into_response(),
        Err(e) => error_reply(e),
    }
}

// Tags

async fn list_tags(state: State) -> Result<Response, Infallible> {
    let mut cache = state.cache.clone();
    let tags = actions::list_tags_cached(&state.pool, &mut cache).await;
    Ok(reply(tags, StatusCode::OK))
}

async fn get_tag(id: Uuid, state: State) -> Result<Response, Infallible> {
    let tag = actions::get_tag(id, &state.pool).await.and_then(|tag| {
        tag.ok_or_else(|| FoodgramError::reference(Entity::Tag, id))
    });
    Ok(reply(tag, StatusCode::OK))
}

async fn create_tag(
    session: SessionData,
    tag: NewTag,
    state: State,
) -> Result<Response, Infallible> {
    if let Err(e) = session.authenticate(ActionType::ManageTags) {
        return Ok(error_reply(e));
    }

    let mut cache = state.cache.clone();
    let tag = actions::create_tag_cached(tag, &state.pool, &mut cache).await;
    Ok(reply(tag, StatusCode::CREATED))
}

// Ingredients

async fn search_ingredients(
    query: IngredientQuery,
    state: State,
) -> Result<Response, Infallible> {
    let mut cache = state.cache.clone();
    let prefix = query.name.unwrap_or_default();
    let ingredients = actions::search_ingredients_cached(&prefix, &state.pool, &mut cache).await;
    Ok(reply(ingredients, StatusCode::OK))
}

async fn get_ingredient(id: Uuid, state: State) -> Result<Response, Infallible> {
    let ingredient = actions::get_ingredient(id, &state.pool)
        .await
        .and_then(|ingredient| {
            ingredient
                .ok_or_else(|| FoodgramError::reference(Entity::Ingredient, id))
        });
    Ok(reply(ingredient, StatusCode::OK))
}

async fn create_ingredient(
    session: SessionData,
    ingredient: NewIngredient,
    state: State,
) -> Result<Response, Infallible> {
    if let Err(e) = session.authenticate(ActionType::ManageIngredients) {
        return Ok(error_reply(e));
    }

    let mut cache = state.cache.clone();
    let ingredient = actions::create_ingredient_cached(ingredient, &state.pool, &mut cache).await;
    Ok(reply(ingredient, StatusCode::CREATED))
}

// Recipes

async fn list_recipes(
    data: FormData,
    session: Option<SessionData>,
    state: State,
) -> Result<Response, Infallible> {
    let form = Form::from_data(data);
    let viewer = session.map(|session| session.user_id);

    let recipes = match RecipeFilter::from_form(&form) {
        Ok(filter) => actions::fetch_recipes(&filter, viewer, &state.pool).await,
        Err(e) => Err(e),
    };
    Ok(reply(recipes, StatusCode::OK))
}

async fn get_recipe(
    id: Uuid,
    session: Option<SessionData>,
    state: State,
) -> Result<Response, Infallible> {
    let viewer = session.map(|session| session.user_id);
    let recipe = actions::get_recipe_detail(id, viewer, &state.pool).await;
    Ok(reply(recipe, StatusCode::OK))
}

async fn create_recipe(
    session: SessionData,
    payload: RecipePayload,
    state: State,
) -> Result<Response, Infallible> {
    let recipe = actions::create_recipe(&session, payload, &state.pool).await;
    Ok(reply(recipe, StatusCode::CREATED))
}

async fn update_recipe(
    id: Uuid,
    session: SessionData,
    payload: RecipePayload,
    state: State,
) -> Result<Response, Infallible> {
    let recipe = actions::update_recipe(id, &session, payload, &state.pool).await;
    Ok(reply(recipe, StatusCode::OK))
}

async fn delete_recipe(
    id: Uuid,
    session: SessionData,
    state: State,
) -> Result<Response, Infallible> {
    Ok(empty_reply(
        actions::delete_recipe(id, &session, &state.pool).await,
    ))
}

async fn add_favorite(
    id: Uuid,
    session: SessionData,
    state: State,
) -> Result<Response, Infallible> {
    let recipe = match session.authenticate(ActionType::ManageOwnCollections) {
        Ok(()) => actions::add_to_favorites(session.user_id, id, &state.pool).await,
        Err(e) => Err(e),
    };
    Ok(reply(recipe, StatusCode::CREATED))
}

async fn remove_favorite(
    id: Uuid,
    session: SessionData,
    state: State,
) -> Result<Response, Infallible> {
    let result = match session.authenticate(ActionType::ManageOwnCollections) {
        Ok(()) => actions::remove_from_favorites(session.user_id, id, &state.pool).await,
        Err(e) => Err(e),
    };
    Ok(empty_reply(result))
}

async fn add_to_cart(
    id: Uuid,
    session: SessionData,
    state: State,
) -> Result<Response, Infallible> {
    let recipe = match session.authenticate(ActionType::ManageOwnCollections) {
        Ok(()) => actions::add_to_shopping_cart(session.user_id, id, &state.pool).await,
        Err(e) => Err(e),
    };
    Ok(reply(recipe, StatusCode::CREATED))
}

async fn remove_from_cart(
    id: Uuid,
    session: SessionData,
    state: State,
) -> Result<Response, Infallible> {
    let result = match session.authenticate(ActionType::ManageOwnCollections) {
        Ok(()) => actions::remove_from_shopping_cart(session.user_id, id, &state.pool).await,
        Err(e) => Err(e),
    };
    Ok(empty_reply(result))
}

async fn download_shopping_cart(
    session: SessionData,
    state: State,
) -> Result<Response, Infallible> {
    Ok(shopping_list_reply(
        actions::download_shopping_list(session.user_id, &state.pool).await,
    ))
}

// Users

async fn list_users(session: Option<SessionData>, state: State) -> Result<Response, Infallible> {
    let viewer = session.map(|session| session.user_id);
    Ok(reply(actions::list_users(viewer, &state.pool).await, StatusCode::OK))
}

async fn get_me(session: SessionData, state: State) -> Result<Response, Infallible> {
    Ok(reply(
        actions::get_me(session.user_id, &state.pool).await,
        StatusCode::OK,
    ))
}

async fn get_user(
    id: Uuid,
    session: Option<SessionData>,
    state: State,
) -> Result<Response, Infallible> {
    let viewer = session.map(|session| session.user_id);
    let profile = actions::get_user_profile(id, viewer, &state.pool).await;
    Ok(reply(profile, StatusCode::OK))
}

async fn list_subscriptions(
    query: SubscriptionQuery,
    session: SessionData,
    state: State,
) -> Result<Response, Infallible> {
    let cards =
        actions::list_subscriptions(session.user_id, query.recipes_limit, &state.pool).await;
    Ok(reply(cards, StatusCode::OK))
}

async fn subscribe(
    id: Uuid,
    query: SubscriptionQuery,
    session: SessionData,
    state: State,
) -> Result<Response, Infallible> {
    let card = match session.authenticate(ActionType::ManageOwnCollections) {
        Ok(()) => actions::subscribe(session.user_id, id, query.recipes_limit, &state.pool).await,
        Err(e) => Err(e),
    };
    Ok(reply(card, StatusCode::CREATED))
}

async fn unsubscribe(
    id: Uuid,
    session: SessionData,
    state: State,
) -> Result<Response, Infallible> {
    let result = match session.authenticate(ActionType::ManageOwnCollections) {
        Ok(()) => actions::unsubscribe(session.user_id, id, &state.pool).await,
        Err(e) => Err(e),
    };
    Ok(empty_reply(result))
}

fn tag_routes(state: State) -> warp::filters::BoxedFilter<(Response,)> {
    let key = state.session_key.clone();

    let list = warp::path!("api" / "tags")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(list_tags);
    let get = warp::path!("api" / "tags" / Uuid)
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(get_tag);
    let create = warp::path!("api" / "tags")
        .and(warp::post())
        .and(with_session(key))
        .and(warp::body::json())
        .and(with_state(state))
        .and_then(create_tag);

    list.or(get).unify().or(create).unify().boxed()
}

fn ingredient_routes(state: State) -> warp::filters::BoxedFilter<(Response,)> {
    let key = state.session_key.clone();

    let search = warp::path!("api" / "ingredients")
        .and(warp::get())
        .and(warp::query::<IngredientQuery>())
        .and(with_state(state.clone()))
        .and_then(search_ingredients);
    let get = warp::path!("api" / "ingredients" / Uuid)
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(get_ingredient);
    let create = warp::path!("api" / "ingredients")
        .and(warp::post())
        .and(with_session(key))
        .and(warp::body::json())
        .and(with_state(state))
        .and_then(create_ingredient);

    search.or(get).unify().or(create).unify().boxed()
}

fn recipe_routes(state: State) -> warp::filters::BoxedFilter<(Response,)> {
    let key = state.session_key.clone();

    let download = warp::path!("api" / "recipes" / "download_shopping_cart")
        .and(warp::get())
        .and(with_session(key.clone()))
        .and(with_state(state.clone()))
        .and_then(download_shopping_cart);
    let list = warp::path!("api" / "recipes")
        .and(warp::get())
        .and(warp::query::<FormData>())
        .and(with_possible_session(key.clone()))
        .and(with_state(state.clone()))
        .and_then(list_recipes);
    let create = warp::path!("api" / "recipes")
        .and(warp::post())
        .and(with_session(key.clone()))
        .and(warp::body::json())
        .and(with_state(state.clone()))
        .and_then(create_recipe);
    let get = warp::path!("api" / "recipes" / Uuid)
        .and(warp::get())
        .and(with_possible_session(key.clone()))
        .and(with_state(state.clone()))
        .and_then(get_recipe);
    let update = warp::path!("api" / "recipes" / Uuid)
        .and(warp::patch())
        .and(with_session(key.clone()))
        .and(warp::body::json())
        .and(with_state(state.clone()))
        .and_then(update_recipe);
    let delete = warp::path!("api" / "recipes" / Uuid)
        .and(warp::delete())
        .and(with_session(key.clone()))
        .and(with_state(state.clone()))
        .and_then(delete_recipe);

    let favorite = warp::path!("api" / "recipes" / Uuid / "favorite");
    let add_favorite = favorite
        .clone()
        .and(warp::post())
        .and(with_session(key.clone()))
        .and(with_state(state.clone()))
        .and_then(add_favorite);
    let remove_favorite = favorite
        .and(warp::delete())
        .and(with_session(key.clone()))
        .and(with_state(state.clone()))
        .and_then(remove_favorite);

    let cart = warp::path!("api" / "recipes" / Uuid / "shopping_cart");
    let add_to_cart = cart
        .clone()
        .and(warp::post())
        .and(with_session(key.clone()))
        .and(with_state(state.clone()))
        .and_then(add_to_cart);
    let remove_from_cart = cart
        .and(warp::delete())
        .and(with_session(key))
        .and(with_state(state))
        .and_then(remove_from_cart);

    download
        .or(list)
        .unify()
        .or(create)
        .unify()
        .or(get)
        .unify()
        .or(update)
        .unify()
        .or(delete)
        .unify()
        .or(add_favorite)
        .unify()
        .or(remove_favorite)
        .unify()
        .or(add_to_cart)
        .unify()
        .or(remove_from_cart)
        .unify()
        .boxed()
}

fn user_routes(state: State) -> warp::filters::BoxedFilter<(Response,)> {
    let key = state.session_key.clone();

    let list = warp::path!("api" / "users")
        .and(warp::get())
        .and(with_possible_session(key.clone()))
        .and(with_state(state.clone()))
        .and_then(list_users);
    let me = warp::path!("api" / "users" / "me")
        .and(warp::get())
        .and(with_session(key.clone()))
        .and(with_state(state.clone()))
        .and_then(get_me);
    let subscriptions = warp::path!("api" / "users" / "subscriptions")
        .and(warp::get())
        .and(warp::query::<SubscriptionQuery>())
        .and(with_session(key.clone()))
        .and(with_state(state.clone()))
        .and_then(list_subscriptions);
    let get = warp::path!("api" / "users" / Uuid)
        .and(warp::get())
        .and(with_possible_session(key.clone()))
        .and(with_state(state.clone()))
        .and_then(get_user);
    let subscribe = warp::path!("api" / "users" / Uuid / "subscribe")
        .and(warp::post())
        .and(warp::query::<SubscriptionQuery>())
        .and(with_session(key.clone()))
        .and(with_state(state.clone()))
        .and_then(subscribe);
    let unsubscribe = warp::path!("api" / "users" / Uuid / "subscribe")
        .and(warp::delete())
        .and(with_session(key))
        .and(with_state(state))
        .and_then(unsubscribe);

    list.or(me)
        .unify()
        .or(subscriptions)
        .unify()
        .or(get)
        .unify()
        .or(subscribe)
        .unify()
        .or(unsubscribe)
        .unify()
        .boxed()
}

/// Every API route, with rejections rendered as JSON errors.
pub fn routes(state: State) -> impl Filter<Extract = (Response,), Error = Infallible> + Clone {
    tag_routes(state.clone())
        .or(ingredient_routes(state.clone()))
        .unify()
        .or(recipe_routes(state.clone()))
        .unify()
        .or(user_routes(state))
        .unify()
        .recover(handle_rejection)
        .unify()
}

async fn handle_rejection(err: Rejection) -> Result<Response, Infallible> {
    let (status, info) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, String::from("Not found"))
    } else if let Some(Unauthorized(info)) = err.find::<Unauthorized>() {
        (StatusCode::UNAUTHORIZED, format!("Invalid session; {info}"))
    } else if let Some(e) = err.find::<BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, format!("Invalid request; {e}"))
    } else if let Some(e) = err.find::<InvalidQuery>() {
        (StatusCode::BAD_REQUEST, format!("Invalid request; {e}"))
    } else if err.find::<MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, String::from("Method not allowed"))
    } else {
        log::error!("Unhandled rejection {err:?}");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            String::from("Internal server error"),
        )
    };

    Ok(warp::reply::with_status(warp::reply::json(&json!({ "errors": info })), status)
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{jwt::SessionKey, schema::MembershipKind};

    #[test]
    fn errors_carry_their_status() {
        let response = error_reply(FoodgramError::AlreadyExists(MembershipKind::Favorite));
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = error_reply(FoodgramError::Forbidden);
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = error_reply(FoodgramError::Conflict("A tag with this slug"));
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = error_reply(FoodgramError::MissingReference(Entity::User));
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn removals_reply_without_content() {
        assert_eq!(empty_reply(Ok(())).status(), StatusCode::NO_CONTENT);
    }

    #[test]
    fn shopping_list_is_an_attachment() {
        let response = shopping_list_reply(Ok(String::from("Список")));

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[CONTENT_DISPOSITION],
            "attachment; filename=\"shopping-cart.txt\""
        );
        assert!(response.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/plain"));
    }

    #[tokio::test]
    async fn missing_session_is_unauthorized() {
        let key = SessionKey::new(b"secret").unwrap();
        let filter = warp::path!("api" / "recipes")
            .and(with_session(key))
            .map(|_session: SessionData| StatusCode::OK.into_response())
            .recover(handle_rejection);

        let response = warp::test::request()
            .method("POST")
            .path("/api/recipes")
            .reply(&filter)
            .await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unknown_path_is_not_found() {
        let filter = warp::path!("api" / "tags")
            .map(|| StatusCode::OK.into_response())
            .recover(handle_rejection);

        let response = warp::test::request().path("/api/nothing").reply(&filter).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn own_profile_is_not_read_as_an_id() {
        let key = SessionKey::new(b"secret").unwrap();
        let me = warp::path!("api" / "users" / "me")
            .and(with_session(key))
            .map(|_session: SessionData| StatusCode::OK.into_response());
        let by_id = warp::path!("api" / "users" / Uuid)
            .map(|_id: Uuid| StatusCode::IM_A_TEAPOT.into_response());
        let filter = me.or(by_id).unify().recover(handle_rejection);

        let response = warp::test::request().path("/api/users/me").reply(&filter).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = warp::test::request().path("/api/users/7").reply(&filter).await;
        assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
    }
}
