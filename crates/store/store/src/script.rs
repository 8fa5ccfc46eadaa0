/// A short script the store executes atomically on the server side.
///
/// Scripts are identified by `name`; backends that cannot run Lua (the
/// in-memory store) dispatch on the name and must return
/// [`StoreError::UnsupportedScript`](crate::StoreError::UnsupportedScript)
/// for scripts they do not emulate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AtomicScript {
    name: &'static str,
    source: &'static str,
}

impl AtomicScript {
    /// Delete a key only if it still holds the expected value.
    ///
    /// KEYS\[1\] = the key
    /// ARGV\[1\] = expected value (lock owner token)
    ///
    /// Returns 1 if the key was deleted, 0 if it was missing or held another
    /// value.
    pub const COMPARE_AND_DELETE: Self = Self::new(
        "compare_and_delete",
        r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#,
    );

    /// Define a script. `name` must be unique among the scripts a backend knows.
    pub const fn new(name: &'static str, source: &'static str) -> Self {
        Self { name, source }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Lua source sent to Redis.
    pub fn source(&self) -> &'static str {
        self.source
    }
}
