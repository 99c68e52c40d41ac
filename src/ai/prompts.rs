pub const SEARCH_SYSTEM: &str = "You turn shopper queries into product search filters. \
Reply with a single JSON object and nothing else.";

pub const RECOGNIZE_SYSTEM: &str = "You catalogue products for an online shop from photos. \
Reply with a single JSON object and nothing else.";

pub fn search_prompt(query: &str, categories: &[String]) -> String {
    format!(
        "Shopper query: {query:?}\n\
         Known categories: {categories}\n\
         Return {{\"keywords\": [string], \"category\": string or null, \
         \"min_price\": integer or null, \"max_price\": integer or null}}.\n\
         Prices are in cents. Use a category only if it is one of the known categories. \
         Keywords are short terms that would appear in a product name or description.",
        categories = categories.join(", ")
    )
}

pub fn recognize_prompt(categories: &[String]) -> String {
    format!(
        "Identify the product in this photo.\n\
         Known categories: {categories}\n\
         Return {{\"name\": string, \"description\": string, \"category\": string or null, \
         \"suggested_price\": integer cents or null, \"attributes\": object}}.\n\
         Attributes hold visible traits such as color, material, brand or size.",
        categories = categories.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_prompt_quotes_the_query() {
        let prompt = search_prompt("cheap \"red\" mug", &["kitchen".into(), "decor".into()]);
        assert!(prompt.contains(r#""cheap \"red\" mug""#));
        assert!(prompt.contains("kitchen, decor"));
    }
}
