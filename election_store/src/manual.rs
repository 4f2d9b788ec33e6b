/*!

This is the long-form manual for `election_store` and the `ballotbox` tool.

## Lifecycle

Every election goes through three stages, in this order only:

| status   | candidates can be added/removed | votes can be cast |
|----------|---------------------------------|-------------------|
| `setup`  | yes                             | no                |
| `voting` | yes                             | yes               |
| `ended`  | no                              | no                |

Voting can only start once the election has at least one candidate. Once
an election has ended, nothing about it can change any more (it can still
be deleted).

Votes are not tied to any voter: each call records exactly one more vote
for the chosen candidate.

## Results

Results list every candidate with its number of votes and its share of the
total, in percent with one decimal. The most voted candidate comes first;
candidates with the same number of votes stay in the order in which they
were registered. When nobody has voted yet, all shares are `0`.

## Stored layout

The whole collection is kept in one slot (by default `elections`) as a JSON
array. With [`crate::FileStorage`], the slot is the file `elections.json`
in the store directory. A missing slot is an empty collection.

```text
[
  {
    "id": "6f1c1e0e-5d55-4a8e-9a34-0f3e2b1f0c2a",
    "name": "Class president",
    "description": "Spring term",
    "candidates": [
      {"id": "0b7f...", "name": "Anna", "number": 1, "party": "Blue", "votes": 3},
      {"id": "91aa...", "name": "Bob", "number": 2, "party": "", "votes": 1}
    ],
    "votes": {"0b7f...": 3, "91aa...": 1},
    "status": "voting",
    "createdAt": "2024-02-01T10:20:30.123Z"
  }
]
```

- `status` is one of `setup`, `voting`, `ended`.
- `createdAt` is an RFC 3339 timestamp.
- `votes` is the reference count of votes per candidate id. The `votes`
  field of each candidate is a copy written for convenience. When reading a
  collection, a candidate missing from `votes` takes the copy (or 0), and
  entries of `votes` that match no candidate are dropped.
- A candidate whose `number` is not a positive integer, or repeats the
  number of an earlier candidate of the same election, is dropped with its
  votes when reading. Each of these repairs is logged as a warning.
- `description` and `party` are empty strings when not provided.

Identifiers are random UUIDs for everything created by this crate, but any
string is accepted when reading.

## The `ballotbox` tool

`ballotbox` works on the store in a directory (`--store`, default: the
current directory):

```bash
ballotbox create "Class president" --description "Spring term"
ballotbox list
ballotbox add-candidate <election> Anna --number 1 --party Blue
ballotbox add-candidate <election> Bob --number 2
ballotbox start <election>
ballotbox vote <election> 1          # by ballot number or candidate id
ballotbox results <election> --refresh 2
ballotbox end <election>
```

`--json` prints `list`, `show` and `results` as JSON. `--verbose` turns on
debug logging (`RUST_LOG` is honored as well).

Settings can also come from a JSON file passed with `--config`:

```text
{ "storeDirectory": "./data", "slot": "elections", "prettyPrint": true }
```

The `--store` flag takes precedence over `storeDirectory`.

 */
