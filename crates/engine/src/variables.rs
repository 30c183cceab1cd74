/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs Ltd <hello@stalw.art>
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

use std::collections::BTreeMap;

use directory::Identity;
use utils::config::Config;

// Placeholder names resolved from directory attributes unless the
// configuration redefines them. Attribute names are matched against the
// lowercased keys the directory backends return.
pub(crate) const DEFAULT_VARIABLES: &[(&str, &str)] = &[
    ("MAILBOXGIVENNAME", "givenname"),
    ("MAILBOXSURNAME", "sn"),
    ("MAILBOXDISPLAYNAME", "displayname"),
    ("MAILBOXMAIL", "mail"),
    ("MAILBOXTITLE", "title"),
    ("MAILBOXDEPARTMENT", "department"),
    ("MAILBOXCOMPANY", "company"),
    ("MAILBOXOFFICE", "physicaldeliveryofficename"),
    ("MAILBOXTELEPHONE", "telephonenumber"),
    ("MAILBOXMOBILE", "mobile"),
    ("MAILBOXSTREET", "streetaddress"),
    ("MAILBOXCITY", "l"),
    ("MAILBOXSTATE", "st"),
    ("MAILBOXPOSTALCODE", "postalcode"),
    ("MAILBOXCOUNTRY", "co"),
];

/// Computes the substitution map for one identity. Implementations are
/// loaded and validated once at startup and never evaluate configuration
/// text as code.
pub trait VariableProvider: Send + Sync {
    fn compute(&self, identity: &Identity) -> BTreeMap<String, String>;
}

/// The stock provider: maps directory attributes to `$NAME$` placeholders,
/// with `MAILBOXSMTPADDRESS` always set from the primary address and
/// configured literals layered on top.
pub struct AttributeVariables {
    attributes: Vec<(String, String)>,
    literals: Vec<(String, String)>,
}

impl AttributeVariables {
    pub fn from_config(config: &Config) -> utils::config::Result<Self> {
        let mut attributes = DEFAULT_VARIABLES
            .iter()
            .map(|(name, attribute)| (name.to_string(), attribute.to_string()))
            .collect::<Vec<_>>();

        for name in config.sub_keys(("variables", "attributes")) {
            validate_name(name)?;
            let attribute = config
                .value_require(("variables", "attributes", name))?
                .to_ascii_lowercase();
            match attributes.iter().position(|(known, _)| known == name) {
                Some(index) => attributes[index].1 = attribute,
                None => attributes.push((name.to_string(), attribute)),
            }
        }

        let mut literals = Vec::new();
        for name in config.sub_keys(("variables", "literals")) {
            validate_name(name)?;
            literals.push((
                name.to_string(),
                config
                    .value_require(("variables", "literals", name))?
                    .to_string(),
            ));
        }

        Ok(AttributeVariables {
            attributes,
            literals,
        })
    }
}

impl VariableProvider for AttributeVariables {
    fn compute(&self, identity: &Identity) -> BTreeMap<String, String> {
        let mut variables = BTreeMap::new();
        for (name, attribute) in &self.attributes {
            variables.insert(
                name.clone(),
                identity
                    .attributes
                    .get(attribute)
                    .and_then(|values| values.first())
                    .cloned()
                    .unwrap_or_default(),
            );
        }
        variables.insert("MAILBOXSMTPADDRESS".to_string(), identity.address.clone());
        for (name, value) in &self.literals {
            variables.insert(name.clone(), value.clone());
        }
        variables
    }
}

fn validate_name(name: &str) -> utils::config::Result<()> {
    if !name.is_empty()
        && name
            .bytes()
            .all(|byte| byte.is_ascii_uppercase() || byte.is_ascii_digit())
    {
        Ok(())
    } else {
        Err(format!(
            "Invalid variable name {name:?}: expected uppercase letters and digits."
        ))
    }
}

/// Replaces `$NAME$` placeholders with their mapped values. Tokens that
/// name no known variable, or that are not a run of uppercase letters and
/// digits, pass through untouched so dollar amounts in template text
/// survive.
pub fn substitute(input: &str, variables: &BTreeMap<String, String>) -> String {
    let mut output = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find('$') {
        output.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        if let Some(end) = after.find('$') {
            let name = &after[..end];
            if !name.is_empty()
                && name
                    .bytes()
                    .all(|byte| byte.is_ascii_uppercase() || byte.is_ascii_digit())
            {
                if let Some(value) = variables.get(name) {
                    output.push_str(value);
                    rest = &after[end + 1..];
                    continue;
                }
            }
        }
        output.push('$');
        rest = after;
    }
    output.push_str(rest);
    output
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use directory::Identity;
    use utils::config::Config;

    use super::{substitute, AttributeVariables, VariableProvider};

    const CONFIG: &str = r#"
[variables.attributes]
MAILBOXFAX = "facsimileTelephoneNumber"
MAILBOXCOUNTRY = "countryCode"

[variables.literals]
DISCLAIMER = "Registered in Narnia"
"#;

    fn identity() -> Identity {
        let mut identity = Identity::new("alice@corp.example.com");
        for (attribute, value) in [
            ("givenname", "Alice"),
            ("sn", "Wonder"),
            ("countrycode", "NL"),
            ("co", "Netherlands"),
        ] {
            identity
                .attributes
                .insert(attribute.to_string(), vec![value.to_string()]);
        }
        identity
    }

    #[test]
    fn defaults_overrides_and_literals() {
        let provider = AttributeVariables::from_config(&Config::new(CONFIG).unwrap())
            .unwrap();
        let variables = provider.compute(&identity());
        assert_eq!(variables["MAILBOXGIVENNAME"], "Alice");
        assert_eq!(variables["MAILBOXSURNAME"], "Wonder");
        assert_eq!(variables["MAILBOXCOUNTRY"], "NL");
        assert_eq!(variables["MAILBOXFAX"], "");
        assert_eq!(variables["MAILBOXSMTPADDRESS"], "alice@corp.example.com");
        assert_eq!(variables["DISCLAIMER"], "Registered in Narnia");
        assert_eq!(variables["MAILBOXTITLE"], "");
    }

    #[test]
    fn invalid_names_are_rejected() {
        for section in ["attributes", "literals"] {
            let config = Config::new(&format!(
                "[variables.{section}]\n\"mailbox-fax\" = \"fax\"\n"
            ))
            .unwrap();
            assert!(AttributeVariables::from_config(&config).is_err());
        }
    }

    #[test]
    fn placeholder_substitution() {
        let mut variables = BTreeMap::new();
        variables.insert("MAILBOXGIVENNAME".to_string(), "Alice".to_string());
        variables.insert("EMPTY".to_string(), String::new());
        for (input, expect) in [
            ("Hi $MAILBOXGIVENNAME$!", "Hi Alice!"),
            ("$MAILBOXGIVENNAME$$MAILBOXGIVENNAME$", "AliceAlice"),
            ("$UNKNOWN$ stays", "$UNKNOWN$ stays"),
            ("price $5 and $10", "price $5 and $10"),
            ("pay $5 to $MAILBOXGIVENNAME$", "pay $5 to Alice"),
            ("gone($EMPTY$)", "gone()"),
            ("trailing $", "trailing $"),
            ("", ""),
        ] {
            assert_eq!(substitute(input, &variables), expect, "{input}");
        }
    }
}
