use std::collections::{BTreeMap, BTreeSet};

use crate::bytecode::compile_error::CompileError;
use crate::bytecode::ir::Program;
use crate::bytecode::op::Op;
use crate::lang::node::Node;

/// Translates a grammar AST into a bytecode [`Program`] following the
/// classical syntax-diagram scheme:
///
/// - a terminal becomes `EXPECT` (or a bare `ACCEPT` when a dispatch just
///   verified the lookahead),
/// - a non-terminal reference becomes `CALL`, patched once every rule's
///   entry offset is known,
/// - optionals and repetitions become `IF` dispatches over the construct's
///   first set, with a backward `JMP` closing the repetition loop,
/// - an alternation dispatches on each alternative's first set in order and
///   fails via a guaranteed-mismatching `EXPECT` when none applies,
/// - a rule is its rhs code plus `RETURN`, entered through the patch table.
///
/// The emitted program starts with `CALL <first rule>; DONE 0`.
pub struct Compiler {
    program: Program,
    /// `CALL` operand sites awaiting the named rule's entry offset.
    patches: Vec<(usize, String)>,
    nullable: BTreeMap<String, bool>,
    first: BTreeMap<String, BTreeSet<String>>,
}

impl Compiler {
    pub fn new() -> Self {
        Self {
            program: Program::new(),
            patches: Vec::new(),
            nullable: BTreeMap::new(),
            first: BTreeMap::new(),
        }
    }

    pub fn compile(mut self, grammar: &Node) -> Result<Program, CompileError> {
        let rules = collect_rules(grammar)?;

        // Every reference must name a defined rule.
        let defined: BTreeSet<&str> = rules.iter().map(|(name, _)| *name).collect();
        let mut referenced = BTreeSet::new();
        for (_, rhs) in &rules {
            collect_idents(rhs, &mut referenced);
        }
        for name in referenced {
            if !defined.contains(name) {
                return Err(CompileError::UndefinedRule {
                    name: name.to_string(),
                });
            }
        }

        self.analyze(&rules);

        // Prologue: run the start rule, then halt with result code 0.
        self.program.emit_op(Op::Call)?;
        let start_call = self.program.emit_addr_placeholder()?;
        self.patches.push((start_call, rules[0].0.to_string()));
        self.program.emit_op(Op::Done)?;
        self.program.emit_byte(0)?;

        for (name, rhs) in &rules {
            let entry = self.program.here() as u16;
            self.program.entries.insert(name.to_string(), entry);
            self.compile_rhs(rhs, false)?;
            self.program.emit_op(Op::Return)?;
        }
        self.program.start = self.program.entries[rules[0].0];

        // Second pass: resolve every CALL operand from the finished table.
        for (at, name) in std::mem::take(&mut self.patches) {
            let entry = *self
                .program
                .entries
                .get(&name)
                .ok_or(CompileError::UndefinedRule { name })?;
            self.program.patch_addr(at, entry);
        }

        Ok(self.program)
    }

    // =========================================================================
    // First/nullable analysis
    // =========================================================================

    /// Fixpoint over all rules; monotone in both maps, so it terminates
    /// even for (left-)recursive grammars.
    fn analyze(&mut self, rules: &[(&str, &Node)]) {
        for (name, _) in rules {
            self.nullable.insert(name.to_string(), false);
            self.first.insert(name.to_string(), BTreeSet::new());
        }
        loop {
            let mut changed = false;
            for (name, rhs) in rules {
                let nullable = self.node_nullable(rhs);
                if nullable != self.nullable[*name] {
                    self.nullable.insert(name.to_string(), nullable);
                    changed = true;
                }
                let first = self.node_first(rhs);
                if first != self.first[*name] {
                    self.first.insert(name.to_string(), first);
                    changed = true;
                }
            }
            if !changed {
                return;
            }
        }
    }

    fn node_nullable(&self, node: &Node) -> bool {
        match node {
            Node::Optional(_) | Node::Repetition(_) => true,
            Node::Terminal(_) => false,
            Node::Identifier(name) => self.nullable.get(name).copied().unwrap_or(false),
            Node::Term(inner) | Node::Grouping(inner) => self.node_nullable(inner),
            Node::Rhs { items, .. } => split_groups(items)
                .iter()
                .any(|group| group.iter().all(|term| self.node_nullable(term))),
            _ => false,
        }
    }

    fn node_first(&self, node: &Node) -> BTreeSet<String> {
        match node {
            Node::Terminal(text) => BTreeSet::from([text.clone()]),
            Node::Identifier(name) => self.first.get(name).cloned().unwrap_or_default(),
            Node::Term(inner)
            | Node::Grouping(inner)
            | Node::Optional(inner)
            | Node::Repetition(inner) => self.node_first(inner),
            Node::Rhs { items, .. } => {
                let mut set = BTreeSet::new();
                for group in split_groups(items) {
                    set.extend(self.seq_first(&group));
                }
                set
            }
            _ => BTreeSet::new(),
        }
    }

    /// First set of a term sequence: successive terms contribute while
    /// their predecessors are all nullable.
    fn seq_first(&self, terms: &[&Node]) -> BTreeSet<String> {
        let mut set = BTreeSet::new();
        for term in terms {
            set.extend(self.node_first(term));
            if !self.node_nullable(term) {
                break;
            }
        }
        set
    }

    // =========================================================================
    // Emission
    // =========================================================================

    /// Dispatch chain: one `IF` per token in `firsts`, all targeting the
    /// body that follows the fall-through `JMP`. Returns the `JMP`'s
    /// operand offset; the body starts at `here` when this returns.
    fn emit_dispatch(&mut self, firsts: &[String]) -> Result<usize, CompileError> {
        let mut body_patches = Vec::new();
        for text in firsts {
            let lit = self.program.intern_literal(text)?;
            self.program.emit_op(Op::If)?;
            self.program.emit_byte(lit)?;
            body_patches.push(self.program.emit_addr_placeholder()?);
        }
        self.program.emit_op(Op::Jmp)?;
        let no_match = self.program.emit_addr_placeholder()?;
        let body = self.program.here() as u16;
        for at in body_patches {
            self.program.patch_addr(at, body);
        }
        Ok(no_match)
    }

    fn compile_rhs(&mut self, node: &Node, guarded: bool) -> Result<(), CompileError> {
        let Node::Rhs { items, alternated } = node else {
            return Err(CompileError::MalformedAst(format!(
                "expected rhs, got {}",
                node.kind_name()
            )));
        };
        let groups = split_groups(items);
        if *alternated {
            self.compile_alternation(&groups)
        } else {
            self.compile_seq(&groups[0], guarded)
        }
    }

    fn compile_seq(&mut self, terms: &[&Node], guarded: bool) -> Result<(), CompileError> {
        for (i, term) in terms.iter().enumerate() {
            self.compile_term(term, guarded && i == 0)?;
        }
        Ok(())
    }

    /// `guarded` means a dispatch already verified the lookahead against
    /// this term's first set; that is only exploited for a direct terminal,
    /// whose first set is exactly its own text.
    fn compile_term(&mut self, term: &Node, guarded: bool) -> Result<(), CompileError> {
        let Node::Term(inner) = term else {
            return Err(CompileError::MalformedAst(format!(
                "expected term, got {}",
                term.kind_name()
            )));
        };
        match &**inner {
            Node::Terminal(text) => {
                if guarded {
                    self.program.emit_op(Op::Accept)?;
                } else {
                    let lit = self.program.intern_literal(text)?;
                    self.program.emit_op(Op::Expect)?;
                    self.program.emit_byte(lit)?;
                }
                Ok(())
            }
            Node::Identifier(name) => {
                self.program.emit_op(Op::Call)?;
                let at = self.program.emit_addr_placeholder()?;
                self.patches.push((at, name.clone()));
                Ok(())
            }
            Node::Grouping(rhs) => self.compile_rhs(rhs, false),
            Node::Optional(rhs) => self.compile_optional(rhs),
            Node::Repetition(rhs) => self.compile_repetition(rhs),
            other => Err(CompileError::MalformedAst(format!(
                "unexpected {} inside term",
                other.kind_name()
            ))),
        }
    }

    /// `IF first(e) -> body; JMP end; body: Pr(e); end:`
    fn compile_optional(&mut self, rhs: &Node) -> Result<(), CompileError> {
        let firsts: Vec<String> = self.node_first(rhs).into_iter().collect();
        let skip = self.emit_dispatch(&firsts)?;
        self.compile_rhs(rhs, true)?;
        let end = self.program.here() as u16;
        self.program.patch_addr(skip, end);
        Ok(())
    }

    /// `start: IF first(e) -> body; JMP end; body: Pr(e); JMP start; end:`
    fn compile_repetition(&mut self, rhs: &Node) -> Result<(), CompileError> {
        let firsts: Vec<String> = self.node_first(rhs).into_iter().collect();
        let start = self.program.here() as u16;
        let exit = self.emit_dispatch(&firsts)?;
        self.compile_rhs(rhs, true)?;
        self.program.emit_op(Op::Jmp)?;
        self.program.emit_addr(start)?;
        let end = self.program.here() as u16;
        self.program.patch_addr(exit, end);
        Ok(())
    }

    /// Dispatches each alternative on its first set, in source order; a
    /// lookahead matching none of them hits a deliberately failing
    /// `EXPECT`, which rejects the run while naming an expected terminal.
    fn compile_alternation(&mut self, groups: &[Vec<&Node>]) -> Result<(), CompileError> {
        let union: BTreeSet<String> = groups
            .iter()
            .flat_map(|group| self.seq_first(group))
            .collect();

        let mut end_patches = Vec::new();
        for group in groups {
            let firsts: Vec<String> = self.seq_first(group).into_iter().collect();
            let no_match = self.emit_dispatch(&firsts)?;
            self.compile_seq(group, true)?;
            self.program.emit_op(Op::Jmp)?;
            end_patches.push(self.program.emit_addr_placeholder()?);
            let next = self.program.here() as u16;
            self.program.patch_addr(no_match, next);
        }

        // No alternative matched. The literal is drawn from the dispatched
        // sets, so this EXPECT can only fail here.
        let expected = union.into_iter().next().unwrap_or_default();
        let lit = self.program.intern_literal(&expected)?;
        self.program.emit_op(Op::Expect)?;
        self.program.emit_byte(lit)?;

        let end = self.program.here() as u16;
        for at in end_patches {
            self.program.patch_addr(at, end);
        }
        Ok(())
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

/// Splits an rhs item list into alternative groups at `Alternate` markers.
fn split_groups(items: &[Node]) -> Vec<Vec<&Node>> {
    let mut groups = vec![Vec::new()];
    for item in items {
        if matches!(item, Node::Alternate) {
            groups.push(Vec::new());
        } else {
            groups.last_mut().unwrap().push(item);
        }
    }
    groups
}

fn collect_rules(grammar: &Node) -> Result<Vec<(&str, &Node)>, CompileError> {
    let Node::Grammar(items) = grammar else {
        return Err(CompileError::MalformedAst(format!(
            "expected grammar, got {}",
            grammar.kind_name()
        )));
    };
    let mut rules = Vec::new();
    let mut seen = BTreeSet::new();
    for item in items {
        match item {
            Node::Rule { lhs, rhs } => {
                let Node::Lhs(name) = &**lhs else {
                    return Err(CompileError::MalformedAst(format!(
                        "expected lhs, got {}",
                        lhs.kind_name()
                    )));
                };
                if !seen.insert(name.as_str()) {
                    return Err(CompileError::DuplicateRule { name: name.clone() });
                }
                rules.push((name.as_str(), &**rhs));
            }
            Node::Eof => {}
            other => {
                return Err(CompileError::MalformedAst(format!(
                    "unexpected {} under grammar",
                    other.kind_name()
                )));
            }
        }
    }
    if rules.is_empty() {
        return Err(CompileError::EmptyGrammar);
    }
    Ok(rules)
}

fn collect_idents<'a>(node: &'a Node, out: &mut BTreeSet<&'a str>) {
    if let Node::Identifier(name) = node {
        out.insert(name);
    }
    for child in node.children() {
        collect_idents(child, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::disasm::decode;
    use crate::frontend::parser::parse_grammar;

    fn compile(source: &str) -> Program {
        let grammar = parse_grammar(source).unwrap();
        Compiler::new().compile(&grammar).unwrap()
    }

    fn compile_err(source: &str) -> CompileError {
        let grammar = parse_grammar(source).unwrap();
        Compiler::new().compile(&grammar).unwrap_err()
    }

    fn opcodes(program: &Program) -> Vec<Op> {
        decode(program).unwrap().into_iter().map(|(_, op)| op).collect()
    }

    #[test]
    fn test_single_terminal_rule() {
        let p = compile("a = \"x\" ;");
        // CALL a; DONE 0; a: EXPECT x; RETURN
        assert_eq!(
            p.code,
            vec![
                Op::Call as u8,
                0,
                5,
                Op::Done as u8,
                0,
                Op::Expect as u8,
                0,
                Op::Return as u8,
            ]
        );
        assert_eq!(p.entries["a"], 5);
        assert_eq!(p.start, 5);
        assert_eq!(p.literals, vec!["x".to_string()]);
    }

    #[test]
    fn test_sequence_concatenates() {
        let p = compile("a = \"x\" , \"y\" ;");
        assert_eq!(
            opcodes(&p),
            vec![Op::Call, Op::Done, Op::Expect, Op::Expect, Op::Return]
        );
    }

    #[test]
    fn test_forward_reference_is_patched() {
        let p = compile("a = b ;\nb = \"x\" ;");
        // The CALL inside rule a targets rule b's final entry offset.
        let a = p.entries["a"] as usize;
        assert_eq!(p.code[a], Op::Call as u8);
        assert_eq!(p.read_addr(a + 1), Some(p.entries["b"]));
    }

    #[test]
    fn test_prologue_calls_start_rule() {
        let p = compile("b = \"y\" ;\na = \"x\" ;");
        assert_eq!(p.code[0], Op::Call as u8);
        assert_eq!(p.read_addr(1), Some(p.entries["b"]));
        assert_eq!(p.start, p.entries["b"]);
        assert_eq!(p.code[3], Op::Done as u8);
        assert_eq!(p.code[4], 0);
    }

    #[test]
    fn test_alternation_dispatch_shape() {
        let p = compile("digit = \"0\" | \"1\" ;");
        let ops = opcodes(&p);
        // Prologue, then per alternative: IF dispatch, JMP past, guarded
        // ACCEPT, JMP end; then the failing EXPECT and RETURN.
        assert_eq!(
            ops,
            vec![
                Op::Call,
                Op::Done,
                Op::If,
                Op::Jmp,
                Op::Accept,
                Op::Jmp,
                Op::If,
                Op::Jmp,
                Op::Accept,
                Op::Jmp,
                Op::Expect,
                Op::Return,
            ]
        );
        assert_eq!(p.literals, vec!["0".to_string(), "1".to_string()]);
    }

    #[test]
    fn test_repetition_loops_backward() {
        let p = compile("a = { \"x\" } ;");
        let entry = p.entries["a"] as usize;
        let ops = decode(&p).unwrap();
        // Last JMP before RETURN closes the loop back to the dispatch.
        let (jmp_at, _) = ops
            .iter()
            .rev()
            .find(|(_, op)| *op == Op::Jmp)
            .copied()
            .unwrap();
        assert_eq!(p.read_addr(jmp_at + 1), Some(entry as u16));
    }

    #[test]
    fn test_optional_skips_forward() {
        let p = compile("a = [ \"x\" ] , \"y\" ;");
        let ops = opcodes(&p);
        assert_eq!(
            ops,
            vec![
                Op::Call,
                Op::Done,
                Op::If,     // lookahead "x" enters the body
                Op::Jmp,    // otherwise skip it
                Op::Accept, // guarded body
                Op::Expect, // "y"
                Op::Return,
            ]
        );
    }

    #[test]
    fn test_first_set_resolves_through_rules() {
        let p = compile("a = [ b ] , \"z\" ;\nb = \"y\" ;");
        // The optional's dispatch literal is b's first terminal.
        let entry = p.entries["a"] as usize;
        assert_eq!(p.code[entry], Op::If as u8);
        let lit = p.code[entry + 1];
        assert_eq!(p.literal(lit), Some("y"));
    }

    #[test]
    fn test_nullable_head_extends_first_set() {
        // first(b) must include "y" because the leading optional can be
        // skipped.
        let p = compile("a = { b } ;\nb = [ \"x\" ] , \"y\" ;");
        let entry = p.entries["a"] as usize;
        let mut lits = Vec::new();
        let mut at = entry;
        while p.code[at] == Op::If as u8 {
            lits.push(p.literal(p.code[at + 1]).unwrap().to_string());
            at += 1 + Op::If.operand_len();
        }
        assert_eq!(lits, vec!["x".to_string(), "y".to_string()]);
    }

    #[test]
    fn test_undefined_rule() {
        assert_eq!(
            compile_err("a = b ;"),
            CompileError::UndefinedRule {
                name: "b".to_string()
            }
        );
    }

    #[test]
    fn test_duplicate_rule() {
        assert_eq!(
            compile_err("a = \"x\" ;\na = \"y\" ;"),
            CompileError::DuplicateRule {
                name: "a".to_string()
            }
        );
    }

    #[test]
    fn test_empty_grammar() {
        assert_eq!(compile_err(""), CompileError::EmptyGrammar);
    }

    #[test]
    fn test_literals_are_deduplicated() {
        let p = compile("a = \"x\" , \"x\" , \"x\" ;");
        assert_eq!(p.literals, vec!["x".to_string()]);
    }
}
