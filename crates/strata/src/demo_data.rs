use strata_core::snapshot::{Category, Group, Item};

/// Generates a small classification tree for demonstration purposes.
///
/// Includes inactive nodes at every level so both snapshot views differ.
pub fn generate_demo_groups() -> Vec<Group> {
    let items = |names: &[&str]| -> Vec<Item> {
        names
            .iter()
            .zip(1..)
            .map(|(name, order)| Item::new(0, *name, order))
            .collect()
    };

    let mut groups = vec![
        Group::new(0, "Practical Life", 1).with_categories(vec![
            Category::new(0, "Care of Self", 1).with_items(items(&[
                "Dresses independently",
                "Washes hands",
                "Pours water",
            ])),
            Category::new(0, "Care of Environment", 2).with_items(items(&[
                "Sweeps floor",
                "Waters plants",
            ])),
        ]),
        Group::new(0, "Sensorial", 2).with_categories(vec![
            Category::new(0, "Visual", 1).with_items(items(&[
                "Grades cylinders by size",
                "Matches colour tablets",
            ])),
            Category::new(0, "Tactile", 2).with_items(items(&["Sorts rough and smooth"])),
        ]),
        Group::new(0, "Language", 3).with_categories(vec![
            Category::new(0, "Oral Language", 1).with_items(items(&[
                "Names objects",
                "Retells a story",
            ])),
            Category::new(0, "Writing", 2).with_items(items(&[
                "Traces sandpaper letters",
                "Builds words with movable alphabet",
            ])),
            Category::new(0, "Phonics (legacy)", 3)
                .with_items(items(&["Identifies initial sounds"]))
                .inactive(),
        ]),
        Group::new(0, "Mathematics", 4).with_categories(vec![
            Category::new(0, "Numeration", 1).with_items(items(&[
                "Counts to ten",
                "Associates numeral and quantity",
            ])),
        ]),
        Group::new(0, "Handwork", 5)
            .with_categories(vec![
                Category::new(0, "Sewing", 1).with_items(items(&["Threads a needle"]))
            ])
            .inactive(),
    ];

    // Number every level sequentially, the way an identity column would.
    let (mut next_category, mut next_item) = (1, 1);
    for (group, id) in groups.iter_mut().zip(1..) {
        group.id = id;
        for category in &mut group.categories {
            category.id = next_category;
            next_category += 1;
            for item in &mut category.items {
                item.id = next_item;
                next_item += 1;
            }
        }
    }

    // One retired item inside an otherwise active category.
    if let Some(item) = groups[0].categories[0].items.last_mut() {
        item.is_active = false;
    }

    groups
}
