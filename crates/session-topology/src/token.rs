//! Values that are only known once the template is applied.
//!
//! A filesystem ID or ARN does not exist until the engine creates the
//! resource, so descriptions hold a [`Token`] naming the resource instead.

use serde_json::{json, Value};

/// A literal or a deploy-time reference to another resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Literal(String),
    /// `Ref` to a resource logical ID or a pseudo parameter.
    Ref(String),
    /// `Fn::GetAtt` on a resource logical ID.
    GetAtt { logical_id: String, attribute: String },
}

impl Token {
    pub fn literal(value: impl Into<String>) -> Self {
        Token::Literal(value.into())
    }

    pub fn reference(logical_id: impl Into<String>) -> Self {
        Token::Ref(logical_id.into())
    }

    pub fn attr(logical_id: impl Into<String>, attribute: impl Into<String>) -> Self {
        Token::GetAtt {
            logical_id: logical_id.into(),
            attribute: attribute.into(),
        }
    }

    /// The stack's region pseudo parameter.
    pub fn region() -> Self {
        Token::Ref("AWS::Region".to_string())
    }

    /// Logical ID this token depends on, if any.
    pub fn target(&self) -> Option<&str> {
        match self {
            Token::Literal(_) => None,
            Token::Ref(id) if id.starts_with("AWS::") => None,
            Token::Ref(id) => Some(id),
            Token::GetAtt { logical_id, .. } => Some(logical_id),
        }
    }

    /// Render as a CloudFormation value.
    pub fn to_cfn(&self) -> Value {
        match self {
            Token::Literal(s) => Value::String(s.clone()),
            Token::Ref(id) => json!({ "Ref": id }),
            Token::GetAtt {
                logical_id,
                attribute,
            } => json!({ "Fn::GetAtt": [logical_id, attribute] }),
        }
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Literal(s) => write!(f, "{s}"),
            Token::Ref(id) => write!(f, "${{{id}}}"),
            Token::GetAtt {
                logical_id,
                attribute,
            } => write!(f, "${{{logical_id}.{attribute}}}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_cfn() {
        assert_eq!(Token::literal("x").to_cfn(), json!("x"));
        assert_eq!(
            Token::reference("sessionEfs").to_cfn(),
            json!({ "Ref": "sessionEfs" })
        );
        assert_eq!(
            Token::attr("sessionEfs2", "Arn").to_cfn(),
            json!({ "Fn::GetAtt": ["sessionEfs2", "Arn"] })
        );
    }

    #[test]
    fn test_target_ignores_pseudo_parameters() {
        assert_eq!(Token::region().target(), None);
        assert_eq!(Token::literal("*").target(), None);
        assert_eq!(Token::attr("sessionEfs", "Arn").target(), Some("sessionEfs"));
    }

    #[test]
    fn test_display() {
        assert_eq!(Token::attr("sessionEfs", "Arn").to_string(), "${sessionEfs.Arn}");
        assert_eq!(Token::region().to_string(), "${AWS::Region}");
    }
}
