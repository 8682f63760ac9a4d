#[macro_use]
extern crate rocket;

#[launch]
fn rocket() -> _ {
    todo_web::rocket()
}
