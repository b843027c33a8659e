//! Formula parser
//!
//! A recursive descent parser over the token stream with explicit operator
//! precedence.

use crate::ast::{BinaryOperator, FormulaExpr, UnaryOperator};
use crate::error::{FormulaError, FormulaResult};
use crate::tokenizer::{tokenize, Token};
use gridbook_core::{CellAddress, CellRange};

/// Parse a formula string into an AST
///
/// The leading `=` is optional.
///
/// # Example
/// ```rust
/// use gridbook_formula::parse_formula;
///
/// let ast = parse_formula("=1+2").unwrap();
/// let ast = parse_formula("=SUM(A1:A10)").unwrap();
/// let ast = parse_formula("=IF(A1>0,\"Yes\",\"No\")").unwrap();
/// let ast = parse_formula("=@[Budget](page-7):B2*2").unwrap();
/// ```
pub fn parse_formula(formula: &str) -> FormulaResult<FormulaExpr> {
    let formula = formula.trim();
    let source = formula.strip_prefix('=').unwrap_or(formula);
    parse_formula_with_depth(source, None)
}

/// Parse a formula body (the text after the leading `=`), failing once
/// nesting exceeds `max_depth` levels
pub fn parse_formula_with_depth(
    source: &str,
    max_depth: Option<usize>,
) -> FormulaResult<FormulaExpr> {
    let tokens = tokenize(source)?;
    let mut parser = FormulaParser {
        tokens,
        pos: 0,
        depth: 0,
        max_depth,
    };
    let expr = parser.parse_expression()?;

    // Make sure we consumed all input
    if let Some(token) = parser.current_token() {
        return Err(FormulaError::Parse(format!(
            "Unexpected token '{}' after expression",
            token
        )));
    }

    Ok(expr)
}

/// Formula parser
struct FormulaParser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    max_depth: Option<usize>,
}

impl FormulaParser {
    fn current_token(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_token(&self) -> Option<&Token> {
        self.tokens.get(self.pos + 1)
    }

    fn consume(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, expected: &Token) -> FormulaResult<()> {
        match self.current_token() {
            Some(token) if token == expected => {
                self.pos += 1;
                Ok(())
            }
            Some(token) => Err(FormulaError::Parse(format!(
                "Expected '{}', got '{}'",
                expected, token
            ))),
            None => Err(FormulaError::Parse(format!(
                "Expected '{}', got end of formula",
                expected
            ))),
        }
    }

    fn unexpected(&self) -> FormulaError {
        match self.current_token() {
            Some(token) => FormulaError::Parse(format!("Unexpected token '{}'", token)),
            None => FormulaError::Parse("Unexpected end of formula".into()),
        }
    }

    // === Expression parsing with precedence ===
    // Precedence (lowest to highest):
    // 1. Comparison: =, <>, <, <=, >, >=
    // 2. Concatenation: &
    // 3. Addition/Subtraction: +, -
    // 4. Multiplication/Division: *, /
    // 5. Exponentiation: ^
    // 6. Unary: -, +
    // 7. Range: :
    // 8. Primary: literals, references, function calls, parentheses

    fn parse_expression(&mut self) -> FormulaResult<FormulaExpr> {
        self.depth += 1;
        if let Some(max) = self.max_depth {
            if self.depth > max {
                return Err(FormulaError::LimitExceeded(format!(
                    "Formula nesting exceeds {} levels",
                    max
                )));
            }
        }
        let result = self.parse_comparison();
        self.depth -= 1;
        result
    }

    fn parse_comparison(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_concatenation()?;

        loop {
            let op = match self.current_token() {
                Some(Token::Equal) => BinaryOperator::Equal,
                Some(Token::NotEqual) => BinaryOperator::NotEqual,
                Some(Token::LessThan) => BinaryOperator::LessThan,
                Some(Token::LessEqual) => BinaryOperator::LessEqual,
                Some(Token::GreaterThan) => BinaryOperator::GreaterThan,
                Some(Token::GreaterEqual) => BinaryOperator::GreaterEqual,
                _ => break,
            };

            self.consume();
            let right = self.parse_concatenation()?;
            left = binary(op, left, right);
        }

        Ok(left)
    }

    fn parse_concatenation(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_additive()?;

        while matches!(self.current_token(), Some(Token::Ampersand)) {
            self.consume();
            let right = self.parse_additive()?;
            left = binary(BinaryOperator::Concat, left, right);
        }

        Ok(left)
    }

    fn parse_additive(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_multiplicative()?;

        loop {
            let op = match self.current_token() {
                Some(Token::Plus) => BinaryOperator::Add,
                Some(Token::Minus) => BinaryOperator::Subtract,
                _ => break,
            };

            self.consume();
            let right = self.parse_multiplicative()?;
            left = binary(op, left, right);
        }

        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_exponent()?;

        loop {
            let op = match self.current_token() {
                Some(Token::Star) => BinaryOperator::Multiply,
                Some(Token::Slash) => BinaryOperator::Divide,
                _ => break,
            };

            self.consume();
            let right = self.parse_exponent()?;
            left = binary(op, left, right);
        }

        Ok(left)
    }

    fn parse_exponent(&mut self) -> FormulaResult<FormulaExpr> {
        let left = self.parse_unary()?;

        if matches!(self.current_token(), Some(Token::Caret)) {
            self.consume();
            let right = self.parse_exponent()?; // Right associative
            return Ok(binary(BinaryOperator::Power, left, right));
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> FormulaResult<FormulaExpr> {
        let op = match self.current_token() {
            Some(Token::Minus) => UnaryOperator::Negate,
            Some(Token::Plus) => UnaryOperator::Plus,
            _ => return self.parse_range(),
        };

        self.consume();
        self.depth += 1;
        if let Some(max) = self.max_depth {
            if self.depth > max {
                return Err(FormulaError::LimitExceeded(format!(
                    "Formula nesting exceeds {} levels",
                    max
                )));
            }
        }
        let operand = self.parse_unary();
        self.depth -= 1;

        Ok(FormulaExpr::UnaryOp {
            op,
            operand: Box::new(operand?),
        })
    }

    fn parse_range(&mut self) -> FormulaResult<FormulaExpr> {
        let left = self.parse_primary()?;

        if matches!(self.current_token(), Some(Token::Colon)) {
            self.consume();
            let right = self.parse_primary()?;

            return match (left, right) {
                (FormulaExpr::CellRef(start), FormulaExpr::CellRef(end)) => {
                    Ok(FormulaExpr::RangeRef(CellRange::new(start, end)))
                }
                _ => Err(FormulaError::Parse(
                    "Both sides of a range must be cell references".into(),
                )),
            };
        }

        Ok(left)
    }

    fn parse_primary(&mut self) -> FormulaResult<FormulaExpr> {
        let Some(token) = self.current_token().cloned() else {
            return Err(self.unexpected());
        };

        match token {
            Token::Number(n) => {
                self.consume();
                Ok(FormulaExpr::Number(n))
            }

            Token::String(s) => {
                self.consume();
                Ok(FormulaExpr::String(s))
            }

            Token::Boolean(b) => {
                self.consume();
                Ok(FormulaExpr::Boolean(b))
            }

            Token::LeftParen => {
                self.consume();
                let expr = self.parse_expression()?;
                self.expect(&Token::RightParen)?;
                Ok(expr)
            }

            Token::Page(reference) => {
                self.consume();
                if !matches!(self.current_token(), Some(Token::Colon)) {
                    return Err(FormulaError::Parse(format!(
                        "Expected ':' after external reference {}",
                        reference.raw
                    )));
                }
                self.consume();
                let start = self.parse_cell_reference(&reference.raw)?;

                if matches!(self.current_token(), Some(Token::Colon))
                    && matches!(self.peek_token(), Some(Token::Cell(_)))
                {
                    self.consume();
                    let end = self.parse_cell_reference(&reference.raw)?;
                    return Ok(FormulaExpr::ExternalRangeRef {
                        reference,
                        range: CellRange::new(start, end),
                    });
                }

                Ok(FormulaExpr::ExternalCellRef {
                    reference,
                    address: start,
                })
            }

            Token::Cell(text) => {
                self.consume();
                cell_address(&text).map(FormulaExpr::CellRef)
            }

            Token::Identifier(name) => {
                self.consume();
                if matches!(self.current_token(), Some(Token::LeftParen)) {
                    self.parse_function_call(name)
                } else {
                    Err(FormulaError::Parse(format!("Unknown identifier '{}'", name)))
                }
            }

            _ => Err(self.unexpected()),
        }
    }

    fn parse_function_call(&mut self, name: String) -> FormulaResult<FormulaExpr> {
        self.expect(&Token::LeftParen)?;

        let mut args = Vec::new();

        if !matches!(self.current_token(), Some(Token::RightParen)) {
            args.push(self.parse_expression()?);

            while matches!(self.current_token(), Some(Token::Comma)) {
                self.consume();
                args.push(self.parse_expression()?);
            }
        }

        self.expect(&Token::RightParen)?;

        Ok(FormulaExpr::Function {
            name: name.to_ascii_uppercase(),
            args,
        })
    }

    /// Cell reference following an external page token
    fn parse_cell_reference(&mut self, page: &str) -> FormulaResult<CellAddress> {
        match self.consume() {
            Some(Token::Cell(text)) => cell_address(&text),
            _ => Err(FormulaError::Parse(format!(
                "Expected cell reference after {}:",
                page
            ))),
        }
    }
}

fn binary(op: BinaryOperator, left: FormulaExpr, right: FormulaExpr) -> FormulaExpr {
    FormulaExpr::BinaryOp {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

fn cell_address(text: &str) -> FormulaResult<CellAddress> {
    CellAddress::parse(text)
        .map_err(|e| FormulaError::Parse(format!("Invalid cell reference '{}': {}", text, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::ExternalReference;

    fn cell(s: &str) -> FormulaExpr {
        FormulaExpr::CellRef(CellAddress::parse(s).unwrap())
    }

    #[test]
    fn test_parse_literals() {
        assert_eq!(parse_formula("=42").unwrap(), FormulaExpr::Number(42.0));
        assert_eq!(
            parse_formula("=\"hi\"").unwrap(),
            FormulaExpr::String("hi".into())
        );
        assert_eq!(parse_formula("=true").unwrap(), FormulaExpr::Boolean(true));
        // The leading '=' is optional
        assert_eq!(parse_formula("7").unwrap(), FormulaExpr::Number(7.0));
    }

    #[test]
    fn test_parse_precedence() {
        let ast = parse_formula("=1+2*3").unwrap();
        assert_eq!(
            ast,
            binary(
                BinaryOperator::Add,
                FormulaExpr::Number(1.0),
                binary(
                    BinaryOperator::Multiply,
                    FormulaExpr::Number(2.0),
                    FormulaExpr::Number(3.0)
                )
            )
        );

        let ast = parse_formula("=A1&1+1>2").unwrap();
        match ast {
            FormulaExpr::BinaryOp { op, left, .. } => {
                assert_eq!(op, BinaryOperator::GreaterThan);
                assert!(matches!(
                    *left,
                    FormulaExpr::BinaryOp {
                        op: BinaryOperator::Concat,
                        ..
                    }
                ));
            }
            other => panic!("expected comparison, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_exponent_right_associative() {
        let ast = parse_formula("=2^3^2").unwrap();
        assert_eq!(
            ast,
            binary(
                BinaryOperator::Power,
                FormulaExpr::Number(2.0),
                binary(
                    BinaryOperator::Power,
                    FormulaExpr::Number(3.0),
                    FormulaExpr::Number(2.0)
                )
            )
        );
    }

    #[test]
    fn test_parse_unary() {
        assert_eq!(
            parse_formula("=-A1").unwrap(),
            FormulaExpr::UnaryOp {
                op: UnaryOperator::Negate,
                operand: Box::new(cell("A1")),
            }
        );
        assert_eq!(
            parse_formula("=+\"3\"").unwrap(),
            FormulaExpr::UnaryOp {
                op: UnaryOperator::Plus,
                operand: Box::new(FormulaExpr::String("3".into())),
            }
        );
    }

    #[test]
    fn test_parse_subtraction_of_literal() {
        assert_eq!(
            parse_formula("=A1-3").unwrap(),
            binary(BinaryOperator::Subtract, cell("A1"), FormulaExpr::Number(3.0))
        );
    }

    #[test]
    fn test_parse_range() {
        assert_eq!(
            parse_formula("=B3:A1").unwrap(),
            FormulaExpr::RangeRef(CellRange::parse("A1:B3").unwrap())
        );
        assert!(parse_formula("=A1:1").is_err());
    }

    #[test]
    fn test_parse_function() {
        let ast = parse_formula("=sum(A1:A3, 2)").unwrap();
        match ast {
            FormulaExpr::Function { name, args } => {
                assert_eq!(name, "SUM");
                assert_eq!(args.len(), 2);
            }
            other => panic!("expected function, got {:?}", other),
        }
        assert_eq!(
            parse_formula("=PI()").unwrap(),
            FormulaExpr::Function {
                name: "PI".into(),
                args: vec![]
            }
        );
    }

    #[test]
    fn test_parse_external_reference() {
        let reference = ExternalReference {
            raw: "@[Other](page2)".into(),
            label: "Other".into(),
            identifier: Some("page2".into()),
            mention_type: None,
        };
        assert_eq!(
            parse_formula("=@[Other](page2):A1+5").unwrap(),
            binary(
                BinaryOperator::Add,
                FormulaExpr::ExternalCellRef {
                    reference: reference.clone(),
                    address: CellAddress::new(0, 0),
                },
                FormulaExpr::Number(5.0)
            )
        );
        assert_eq!(
            parse_formula("=@[Other](page2):A1:B2").unwrap(),
            FormulaExpr::ExternalRangeRef {
                reference,
                range: CellRange::parse("A1:B2").unwrap(),
            }
        );
        assert!(parse_formula("=@[Other]A1").is_err());
        assert!(parse_formula("=@[Other]:5").is_err());
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(parse_formula("="), Err(FormulaError::Parse(_))));
        assert!(matches!(parse_formula("=1 2"), Err(FormulaError::Parse(_))));
        assert!(matches!(parse_formula("=(1+2"), Err(FormulaError::Parse(_))));
        assert!(matches!(parse_formula("=foo"), Err(FormulaError::Parse(_))));
        assert!(matches!(parse_formula("=1 $ 2"), Err(FormulaError::Tokenize(_))));
        // Only one leading '=' is stripped
        assert!(matches!(parse_formula("==1+1"), Err(FormulaError::Parse(_))));
        assert!(parse_formula_with_depth("=1+1", None).is_err());
        assert_eq!(
            parse_formula("=1+").unwrap_err().to_string(),
            "Unexpected end of formula"
        );
    }

    #[test]
    fn test_parse_depth_limit() {
        let nested = format!("{}1{}", "(".repeat(10), ")".repeat(10));
        assert!(parse_formula_with_depth(&nested, Some(20)).is_ok());
        assert!(matches!(
            parse_formula_with_depth(&nested, Some(5)),
            Err(FormulaError::LimitExceeded(_))
        ));
    }
}
