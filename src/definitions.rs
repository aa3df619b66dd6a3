pub const SEASONS: &[&str] = &["Spring", "Summer", "Fall", "Winter"];

pub const DAYS_PER_SEASON: u32 = 28;

pub const SKILLS: &[&str] = &["Farming", "Mining", "Foraging", "Fishing", "Combat"];

pub const VILLAGERS: &[&str] = &[
    "Abigail", "Alex", "Caroline", "Clint", "Demetrius", "Dwarf", "Elliott", "Emily",
    "Evelyn", "George", "Gus", "Haley", "Harvey", "Jas", "Jodi", "Kent", "Krobus",
    "Leah", "Leo", "Lewis", "Linus", "Marnie", "Maru", "Pam", "Penny", "Pierre",
    "Robin", "Sam", "Sandy", "Sebastian", "Shane", "Vincent", "Willy", "Wizard",
];

pub fn is_skill(name: &str) -> bool {
    SKILLS.contains(&name)
}
