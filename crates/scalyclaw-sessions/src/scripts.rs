/// `acquireSession` — accepted only if no fresh session exists; a stale
/// session (heartbeat older than `ARGV[3]` ms) may be stolen. Sets state
/// PROCESSING, refreshes the safety TTL, heartbeat now (spec.md §4.14).
pub const ACQUIRE: &str = r#"
local state = redis.call('HGET', KEYS[1], 'state')
if state == false then
    redis.call('HSET', KEYS[1], 'state', 'processing', 'owner', ARGV[1], 'heartbeat', ARGV[2], 'acquired', ARGV[2])
    redis.call('EXPIRE', KEYS[1], ARGV[4])
    return 1
end
if state == 'cancelling' then
    return 0
end
local heartbeat = tonumber(redis.call('HGET', KEYS[1], 'heartbeat'))
if (tonumber(ARGV[2]) - heartbeat) > tonumber(ARGV[3]) then
    redis.call('HSET', KEYS[1], 'state', 'processing', 'owner', ARGV[1], 'heartbeat', ARGV[2], 'acquired', ARGV[2])
    redis.call('EXPIRE', KEYS[1], ARGV[4])
    return 1
end
return 0
"#;

/// `heartbeat` — ignored if the caller isn't the owner; never overwrites
/// a sticky CANCELLING state.
pub const HEARTBEAT: &str = r#"
local owner = redis.call('HGET', KEYS[1], 'owner')
if owner ~= ARGV[1] then
    return 0
end
local state = redis.call('HGET', KEYS[1], 'state')
if state == 'cancelling' then
    return 0
end
redis.call('HSET', KEYS[1], 'heartbeat', ARGV[2])
redis.call('EXPIRE', KEYS[1], ARGV[3])
return 1
"#;

/// `requestCancel` — flips state to CANCELLING if the record exists;
/// idempotent.
pub const REQUEST_CANCEL: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 0 then
    return 0
end
redis.call('HSET', KEYS[1], 'state', 'cancelling')
return 1
"#;

/// `releaseSession` — idempotent; owner-checked.
pub const RELEASE: &str = r#"
local owner = redis.call('HGET', KEYS[1], 'owner')
if owner == false then
    return 1
end
if owner ~= ARGV[1] then
    return 0
end
redis.call('DEL', KEYS[1])
return 1
"#;
