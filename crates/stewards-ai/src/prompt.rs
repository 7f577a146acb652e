//! Instruction template sent with every document.

use stewards_core::incidents;

const PREAMBLE: &str = "\
You are an F1 steward. The text below contains incident report(s).

For each incident, extract these fields as a JSON array of objects (one object per incident).
If a field is not mentioned, set it to null.

Fields:";

/// Per-field guidance, keyed by schema field name.
const FIELD_HINTS: &[(&str, &str)] = &[
    (
        "type_of_document",
        "(e.g. \"technical delegate report\", \"stewards decision\", \"team report\", \"driver report\" or anything else) [str]",
    ),
    ("year", "[int]"),
    ("grand_prix", "[str]"),
    ("description", "(brief summary of what happened) [str]"),
    ("session_type", "(e.g. \"FP1\", \"FP2\", \"Qualifying\", \"Race\") [str]"),
    ("track", "(if mentioned) [str]"),
    ("lap_number", "(if mentioned) [int]"),
    ("turn_number", "(if mentioned) [str]"),
    ("safety_car_or_vsc_involved", "(if mentioned) [str]"),
    ("penalty_given", "[str]"),
    ("type_of_incident", "(if mentioned) [str]"),
    ("was_contact_made", "(if mentioned) [str]"),
    ("immediate_advantage_gained", "(if mentioned) [str]"),
    ("drivers_involved", "(if mentioned) [str]"),
    ("teams_involved", "(if mentioned) [str]"),
    ("rule_violated", "or relevant_rule (if mentioned) [str]"),
    ("decision_notes", "(any justification or rationale given) [str]"),
];

const EXAMPLE: &str = r#"For example, for the text below:
2022 ABU DHABI GRAND PRIX
18 - 20 November 2022
From The FIA Formula One Media Delegate Document 3
To All Teams, All Officials Date 17 November 2022
Time 11:30
Title Car Display Procedure
NOTE TO TEAMS: CAR DISPLAY PROCEDURES
In addition to the requirements set out in Article 19 of the FIA Formula One Sporting Regulations, please
note the following procedures for the Car Display at this event:
Between 12:30 and 13:30 on Friday, one car from each team must be positioned as shown in the
attached drawing, with the other car positioned and available for viewing inside your garage.
Time Team
12:30 - 12:36 Mercedes
12:36 - 12:42 Red Bull Racing
12:42 - 12:48 Ferrari
12:48 - 12:54 McLaren
12:54 - 13:00 Alpine
13:00 - 13:06 AlphaTauri
13:06 - 13:12 Aston Martin
13:12 - 13:18 Williams
13:18 - 13:24 Alfa Romeo
13:24 - 13:30 Haas
After Qualifying, three cars for the presentation will be selected for display at this event.
Tom Wood
The FIA Formula One Media Delegate

the output should be:
[
  {
    "type_of_document": "Media delegate note / procedural document",
    "year": 2022,
    "grand_prix": "Abu Dhabi Grand Prix",
    "description": "Car Display Procedure for the event, specifying display times, arrangements, and post-qualifying car display instructions.",
    "session_type": null,
    "track": "Yas Marina Circuit",
    "lap_number": null,
    "turn_number": null,
    "safety_car_or_vsc_involved": null,
    "penalty_given": null,
    "type_of_incident": null,
    "was_contact_made": null,
    "immediate_advantage_gained": null,
    "drivers_involved": null,
    "teams_involved": ["Mercedes", "Red Bull Racing", "Ferrari", "McLaren", "Alpine", "AlphaTauri", "Aston Martin", "Williams", "Alfa Romeo", "Haas"],
    "rule_violated": null,
    "decision_notes": "Additional procedures for car displays; details given for pre-event and post-qualifying display arrangements."
  }
]"#;

const CLOSING: &str = "Return **ONLY valid JSON**, no extra commentary.";

/// Fill the instruction template with a document's text.
///
/// The field list is generated from the schema so the prompt and the store
/// columns cannot disagree.
pub fn build_prompt(document_text: &str) -> String {
    let mut prompt = String::with_capacity(document_text.len() + 4096);
    prompt.push_str(PREAMBLE);
    prompt.push('\n');
    for name in incidents::model_field_names() {
        let hint = FIELD_HINTS
            .iter()
            .find(|(field, _)| *field == name)
            .map(|(_, hint)| *hint)
            .unwrap_or("[str]");
        prompt.push_str(&format!("- {name} {hint}\n"));
    }
    prompt.push('\n');
    prompt.push_str(EXAMPLE);
    prompt.push_str("\n\n");
    prompt.push_str(CLOSING);
    prompt.push_str("\n\nIncident text:\n");
    prompt.push_str(document_text);
    prompt.push('\n');
    prompt
}
