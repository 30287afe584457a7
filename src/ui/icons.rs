pub struct Icons;

impl Icons {
    pub const ROCKET: &str = "🚀";
    pub const SEARCH: &str = "🔍";
    pub const CHECK: &str = "✅";
    pub const WARN: &str = "⚠️";
    pub const INFO: &str = "ℹ️";
    pub const STATS: &str = "📊";
    pub const DEL: &str = "🗑️";
    pub const PACKAGE: &str = "📦";
    pub const DATABASE: &str = "🗄️";
    pub const CHIP: &str = "🔲";
    pub const FACTORY: &str = "🏭";
    pub const TREE: &str = "🌳";
    pub const LINK: &str = "🔗";
    pub const GEAR: &str = "⚙️";
}
