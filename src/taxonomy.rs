//! Fixed category taxonomy
//!
//! Two-level category table every record must classify into. The table is
//! static and read-only for the whole process; membership checks are exact
//! string equality.

/// Main category name → ordered sub-category names.
///
/// The numbering in the prompt rendering matches the upstream ledger format,
/// so the order of this table is part of the contract.
pub const CATEGORIES: &[(&str, &[&str])] = &[
    (
        "Income",
        &[
            "Salary",
            "Bonus",
            "Reimbursement",
            "Interest/Dividends",
            "Gift money",
            "Other",
        ],
    ),
    (
        "Fixed Expense",
        &[
            "Rent",
            "Phone/Internet",
            "Insurance",
            "Subscriptions",
            "Utilities",
        ],
    ),
    (
        "Dining",
        &[
            "Delivery",
            "Groceries",
            "Snacks/Drinks",
            "Alcohol",
            "Restaurant",
            "Fruit",
        ],
    ),
    (
        "Transport&Lodging",
        &[
            "Public transit",
            "Taxi",
            "Train",
            "Shared bike",
            "Flight",
            "Lodging",
            "Power bank rental",
        ],
    ),
    (
        "Home&Daily",
        &[
            "Daily goods",
            "Repairs",
            "Furniture",
            "Appliances",
            "Hardware tools",
        ],
    ),
    (
        "Medical&Health",
        &[
            "Clinic visits",
            "Dental",
            "Medicine",
            "Medical supplies",
            "Hospitalization",
            "Checkups",
            "Fitness",
        ],
    ),
    (
        "Apparel&Personal care",
        &[
            "Clothing",
            "Accessories",
            "Cosmetics/Skincare",
            "Beauty/Hair",
        ],
    ),
    (
        "Entertainment&Social",
        &["Media/Games", "Outings", "Gatherings", "Gifts/Favors"],
    ),
    (
        "Learning&Tools",
        &[
            "Books",
            "Courses",
            "Enrollment fees",
            "Stationery/Office supplies",
            "Software tools",
        ],
    ),
    ("Visa&Misc required fees", &["Documents/Visa"]),
];

/// Sub-categories for a main category, or `None` if the main category
/// does not exist.
pub fn subcategories(main: &str) -> Option<&'static [&'static str]> {
    CATEGORIES
        .iter()
        .find(|(name, _)| *name == main)
        .map(|(_, subs)| *subs)
}

pub fn contains_main(main: &str) -> bool {
    subcategories(main).is_some()
}

/// A (main, sub) pair is valid iff `main` is a key and `sub` is a member
/// of that key's set.
pub fn is_valid_pair(main: &str, sub: &str) -> bool {
    subcategories(main)
        .map(|subs| subs.contains(&sub))
        .unwrap_or(false)
}

/// Render the taxonomy as the numbered block embedded in the model prompt.
///
/// Example line: `03 Dining: Delivery, Groceries, ...`
pub fn prompt_block() -> String {
    let mut block = String::new();
    for (i, (main, subs)) in CATEGORIES.iter().enumerate() {
        block.push_str(&format!("{:02} {}: {}\n", i + 1, main, subs.join(", ")));
    }
    block
}
