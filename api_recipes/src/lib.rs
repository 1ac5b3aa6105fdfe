use actix_web::web;

pub mod routes {
    pub mod favorite;
    pub mod recipe;
}

pub mod services {
    pub mod favorite;
    pub mod recipe;
}

pub mod dtos {
    pub mod recipe;
}

/// Public catalog.
pub fn mount_catalog() -> actix_web::Scope {
    web::scope("/recipes")
        .service(routes::recipe::get_recipes)
        .service(routes::recipe::get_recipe)
}

pub fn mount_secure_recipes() -> actix_web::Scope {
    web::scope("/recipes")
        .service(routes::recipe::post_recipe)
        .service(routes::recipe::get_my_recipes)
        .service(routes::recipe::put_recipe)
        .service(routes::recipe::delete_recipe)
        .service(routes::favorite::post_toggle_favorite)
}

pub fn mount_favorites() -> actix_web::Scope {
    web::scope("/favorites").service(routes::favorite::get_favorites)
}
