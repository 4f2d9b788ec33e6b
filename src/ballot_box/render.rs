// Text and JSON views of the elections.

use std::fmt::Write;

use election_store::*;
use serde_json::json;
use serde_json::Value as JSValue;

const BAR_WIDTH: usize = 20;

pub fn list_text(summaries: &[ElectionSummary]) -> String {
    if summaries.is_empty() {
        return "No elections yet.\n".to_string();
    }
    let mut s = String::new();
    for e in summaries {
        let _ = writeln!(
            s,
            "{}  [{}]  {}  candidates: {}  votes: {}  created: {}",
            e.id,
            e.status,
            e.name,
            e.candidate_count,
            e.total_votes,
            e.created_at.format("%Y-%m-%d")
        );
        if !e.description.is_empty() {
            let _ = writeln!(s, "    {}", e.description);
        }
    }
    s
}

pub fn list_json(summaries: &[ElectionSummary]) -> JSValue {
    json!({ "elections": summaries })
}

fn candidate_label(c: &Candidate) -> String {
    match c.party() {
        Some(party) => format!("#{} {} ({})", c.number, c.name, party),
        None => format!("#{} {}", c.number, c.name),
    }
}

pub fn election_text(election: &Election) -> String {
    let mut s = String::new();
    let _ = writeln!(s, "{} [{}]", election.name(), election.status());
    if election.description().is_empty() {
        let _ = writeln!(s, "(no description)");
    } else {
        let _ = writeln!(s, "{}", election.description());
    }
    let _ = writeln!(
        s,
        "id: {}  created: {}",
        election.id(),
        election.created_at().format("%Y-%m-%d %H:%M")
    );
    let _ = writeln!(s);
    if election.candidate_count() == 0 {
        let _ = writeln!(s, "No candidates yet.");
        return s;
    }
    let _ = writeln!(s, "Candidates:");
    for c in election.candidates_by_number() {
        let _ = writeln!(
            s,
            "  {:<30} {:>6} votes  {}",
            candidate_label(c),
            election.votes_for(&c.id).unwrap_or(0),
            c.id
        );
    }
    let _ = writeln!(s);
    s.push_str(&results_text(&election.tally()));
    s
}

pub fn election_json(election: &Election) -> JSValue {
    json!({ "election": election, "results": election.tally() })
}

pub fn results_text(tally: &Tally) -> String {
    let mut s = String::new();
    if tally.rows.is_empty() {
        let _ = writeln!(s, "No candidates.");
        return s;
    }
    let _ = writeln!(s, "Total votes: {}", tally.total_votes);
    let leader = tally.leader().map(|r| &r.candidate.id);
    for row in tally.rows.iter() {
        let filled = ((row.percentage / 100.0) * BAR_WIDTH as f64).round() as usize;
        let filled = filled.min(BAR_WIDTH);
        let marker = if Some(&row.candidate.id) == leader {
            "  <- leading"
        } else {
            ""
        };
        let _ = writeln!(
            s,
            "  {:<30} {:>6} {:>5.1}% {}{}{}",
            candidate_label(&row.candidate),
            row.votes,
            row.percentage,
            "#".repeat(filled),
            ".".repeat(BAR_WIDTH - filled),
            marker
        );
    }
    s
}

pub fn results_json(tally: &Tally) -> JSValue {
    json!({ "results": tally })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Election {
        let mut e = Election::new("Class president", "Spring").unwrap();
        let a = e.add_candidate("Anna", 2, "Blue").unwrap().id;
        let b = e.add_candidate("Bob", 1, "").unwrap().id;
        let c = e.add_candidate("Clara", 3, "").unwrap().id;
        e.start_voting().unwrap();
        for cid in [&a, &a, &a, &b, &b, &b, &c] {
            e.cast_vote(cid).unwrap();
        }
        e
    }

    #[test]
    fn empty_list() {
        assert_eq!(list_text(&[]), "No elections yet.\n");
        assert_eq!(list_json(&[])["elections"], json!([]));
    }

    #[test]
    fn list() {
        let e = sample();
        let s = list_text(&[e.summary()]);
        assert!(s.contains("[voting]  Class president  candidates: 3  votes: 7"));
        assert!(s.contains("\n    Spring\n"));
        let js = list_json(&[e.summary()]);
        assert_eq!(js["elections"][0]["candidateCount"], 3);
        assert_eq!(js["elections"][0]["totalVotes"], 7);
    }

    #[test]
    fn results_in_tally_order() {
        let s = results_text(&sample().tally());
        let lines: Vec<&str> = s.lines().collect();
        assert_eq!(lines[0], "Total votes: 7");
        assert!(lines[1].contains("#2 Anna (Blue)"));
        assert!(lines[1].contains("42.9%"));
        assert!(lines[1].ends_with("<- leading"));
        assert!(lines[2].contains("#1 Bob"));
        assert!(!lines[2].contains("leading"));
        assert!(lines[3].contains("#3 Clara"));
        assert!(lines[3].contains("14.3%"));
    }

    #[test]
    fn no_leader_without_votes() {
        let mut e = Election::new("E", "").unwrap();
        e.add_candidate("A", 1, "").unwrap();
        let s = results_text(&e.tally());
        assert!(s.contains("0.0%"));
        assert!(!s.contains("leading"));
    }

    #[test]
    fn candidates_by_ballot_number() {
        let s = election_text(&sample());
        let bob = s.find("#1 Bob").unwrap();
        let anna = s.find("#2 Anna").unwrap();
        assert!(bob < anna);
        assert!(s.starts_with("Class president [voting]\nSpring\n"));
    }

    #[test]
    fn election_as_json() {
        let e = sample();
        let js = election_json(&e);
        assert_eq!(js["election"]["status"], "voting");
        assert_eq!(js["results"]["totalVotes"], 7);
        assert_eq!(js["results"]["rows"][2]["percentage"], 14.3);
    }
}
