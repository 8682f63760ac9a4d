#[macro_use]
extern crate rocket;

use rocket::{
    figment::Provider,
    form::Form,
    response::{content::RawHtml, Redirect},
    tokio::sync::RwLock,
    Build, Rocket, State,
};
use todo_common::{
    add_item_path, list_path, Row, HOME_HEADER, LIST_HEADER, LIST_TABLE_ID, NEW_ITEM_FIELD,
    NEW_ITEM_INPUT_ID, NEW_ITEM_PLACEHOLDER, NEW_LIST_PATH, PAGE_TITLE,
};

/// In-memory lists, indexed by `list_id - 1`.
#[derive(Default)]
pub struct Lists {
    lists: RwLock<Vec<Vec<String>>>,
}

impl Lists {
    async fn create(&self, first_item: String) -> usize {
        let mut lists = self.lists.write().await;
        lists.push(vec![first_item]);
        lists.len()
    }

    async fn add(&self, list_id: usize, item: String) -> bool {
        let mut lists = self.lists.write().await;
        match list_id.checked_sub(1).and_then(|index| lists.get_mut(index)) {
            Some(items) => {
                items.push(item);
                true
            }
            None => false,
        }
    }

    async fn items(&self, list_id: usize) -> Option<Vec<String>> {
        let lists = self.lists.read().await;
        list_id
            .checked_sub(1)
            .and_then(|index| lists.get(index))
            .cloned()
    }
}

// Field name must stay in sync with `NEW_ITEM_FIELD`.
#[derive(FromForm)]
struct NewItem {
    item_text: String,
}

#[get("/")]
fn home() -> RawHtml<String> {
    RawHtml(render(HOME_HEADER, NEW_LIST_PATH, &[]))
}

#[post("/lists/new", data = "<item>")]
async fn new_list(lists: &State<Lists>, item: Form<NewItem>) -> Redirect {
    let list_id = lists.create(item.into_inner().item_text).await;
    Redirect::to(list_path(list_id))
}

#[get("/lists/<list_id>")]
async fn view_list(lists: &State<Lists>, list_id: usize) -> Option<RawHtml<String>> {
    let items = lists.items(list_id).await?;
    Some(RawHtml(render(LIST_HEADER, &add_item_path(list_id), &items)))
}

#[post("/lists/<list_id>/add_item", data = "<item>")]
async fn add_item(lists: &State<Lists>, list_id: usize, item: Form<NewItem>) -> Option<Redirect> {
    if lists.add(list_id, item.into_inner().item_text).await {
        Some(Redirect::to(list_path(list_id)))
    } else {
        None
    }
}

fn render(header: &str, action: &str, items: &[String]) -> String {
    let rows: String = items
        .iter()
        .enumerate()
        .map(|(index, text)| {
            format!(
                "<tr><td>{}</td></tr>",
                escape(&Row::new(index + 1, text.as_str()).to_string())
            )
        })
        .collect();

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{title}</title>
</head>
<body>
<h1>{header}</h1>
<form method="POST" action="{action}">
<input name="{field}" id="{input_id}" placeholder="{placeholder}" autofocus />
</form>
<table id="{table_id}">{rows}</table>
</body>
</html>
"#,
        title = PAGE_TITLE,
        header = header,
        action = action,
        field = NEW_ITEM_FIELD,
        input_id = NEW_ITEM_INPUT_ID,
        placeholder = NEW_ITEM_PLACEHOLDER,
        table_id = LIST_TABLE_ID,
        rows = rows,
    )
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// The app configured from Rocket's default figment (`Rocket.toml`, `ROCKET_*`).
pub fn rocket() -> Rocket<Build> {
    build(rocket::Config::figment())
}

/// The app configured from `provider`, each instance with its own empty lists.
pub fn build<T: Provider>(provider: T) -> Rocket<Build> {
    rocket::custom(provider)
        .manage(Lists::default())
        .mount("/", routes![home, new_list, view_list, add_item])
}
