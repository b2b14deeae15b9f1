use serde::Deserialize;

use crate::feed::Page;

/// Tag identifier; tags are the filters a dish feed is scoped by.
pub type TagId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Tag {
    pub id: TagId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Quantity {
    pub amount: f64,
    pub unit: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Ingredient {
    pub name: String,
    #[serde(default)]
    pub quantity: Option<Quantity>,
}

impl Ingredient {
    /// "200 g flour" with the amount scaled by `multiplier`, or just the
    /// name when no quantity is given.
    pub fn display(&self, multiplier: f64) -> String {
        match &self.quantity {
            Some(q) => {
                let amount = format_amount(q.amount * multiplier);
                if q.unit.is_empty() {
                    format!("{} {}", amount, self.name)
                } else {
                    format!("{} {} {}", amount, q.unit, self.name)
                }
            }
            None => self.name.clone(),
        }
    }
}

fn format_amount(amount: f64) -> String {
    if amount.fract() == 0.0 {
        format!("{}", amount as i64)
    } else {
        format!("{amount:.2}")
            .trim_end_matches('0')
            .trim_end_matches('.')
            .to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Dish {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub ingredients: Vec<Ingredient>,
    #[serde(default)]
    pub recipe: Option<String>,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

/// One page of `GET /dishes?tag=..&page=..`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DishesPage {
    pub dishes: Vec<Dish>,
    pub current_page: u32,
    pub has_next: bool,
    pub has_previous: bool,
}

impl From<DishesPage> for Page<Dish> {
    fn from(page: DishesPage) -> Self {
        Page {
            items: page.dishes,
            current_page: page.current_page,
            has_next: page.has_next,
            has_previous: page.has_previous,
        }
    }
}
